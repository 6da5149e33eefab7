//! Borrow record model and the lending state machine.
//!
//! A book copy goes `Available -> OnLoan -> Returned`. Each transition has
//! a precondition; when it does not hold the transition is a no-op rather
//! than an error, and callers see [`Outcome::Unchanged`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Days added to the due date on borrow and on each renewal
pub const LOAN_PERIOD_DAYS: i64 = 14;

pub fn loan_period() -> Duration {
    Duration::days(LOAN_PERIOD_DAYS)
}

/// Lending state of a copy as seen through its borrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    /// No record
    Available,
    OnLoan,
    /// Terminal
    Returned,
}

impl LoanState {
    pub fn of(record: Option<&BorrowRecord>) -> Self {
        record.map_or(LoanState::Available, BorrowRecord::state)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// `None` while the copy is still out
    pub return_date: Option<DateTime<Utc>>,
}

impl BorrowRecord {
    pub fn is_outstanding(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn state(&self) -> LoanState {
        if self.is_outstanding() {
            LoanState::OnLoan
        } else {
            LoanState::Returned
        }
    }

    /// Push the due date back by `period`. Only outstanding records renew.
    pub fn renew(&mut self, period: Duration) -> bool {
        if !self.is_outstanding() {
            return false;
        }
        self.due_date += period;
        true
    }

    /// Stamp the return date. The stamp is written once and never moved.
    pub fn close(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_outstanding() {
            return false;
        }
        self.return_date = Some(now);
        true
    }
}

/// Record about to be inserted, produced by [`super::Book::lend_to`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewBorrow {
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Borrow record joined with borrower and book for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecordDetails {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub book_id: i32,
    pub book_title: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub overdue: bool,
}

/// Librarian filter over all borrow records
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BorrowFilter {
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    /// `true`: still out, `false`: returned
    pub outstanding: Option<bool>,
    pub page: Option<i64>,
}

/// Whether a transition changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Unchanged,
}

impl From<bool> for Outcome {
    fn from(applied: bool) -> Self {
        if applied {
            Outcome::Applied
        } else {
            Outcome::Unchanged
        }
    }
}

/// Result of borrow / renew / return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transition {
    pub status: Outcome,
    /// Lending state after the transition
    pub state: LoanState,
    /// Record after the transition; absent when a borrow found no copy
    pub record: Option<BorrowRecord>,
}

impl Transition {
    pub fn applied(record: BorrowRecord) -> Self {
        Self::new(Outcome::Applied, Some(record))
    }

    pub fn unchanged(record: Option<BorrowRecord>) -> Self {
        Self::new(Outcome::Unchanged, record)
    }

    fn new(status: Outcome, record: Option<BorrowRecord>) -> Self {
        Self {
            status,
            state: LoanState::of(record.as_ref()),
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;
    use rust_decimal::Decimal;

    fn book(quantity: i32) -> Book {
        Book {
            id: 3,
            title: "Gulliver's Travels".into(),
            author: "Jonathan Swift".into(),
            publisher: String::new(),
            publication_date: None,
            price: Decimal::ZERO,
            isbn: String::new(),
            category_id: None,
            description: String::new(),
            quantity,
        }
    }

    fn persist(new: NewBorrow, id: i32) -> BorrowRecord {
        BorrowRecord {
            id,
            user_id: new.user_id,
            book_id: new.book_id,
            borrow_date: new.borrow_date,
            due_date: new.due_date,
            return_date: None,
        }
    }

    #[test]
    fn borrow_then_return_restores_quantity() {
        let mut b = book(3);
        let now = Utc::now();
        let mut record = persist(b.lend_to(1, now, loan_period()).unwrap(), 1);
        assert_eq!(b.quantity, 2);
        assert_eq!(record.state(), LoanState::OnLoan);

        assert!(b.take_back(&mut record, now + Duration::days(2)));
        assert_eq!(b.quantity, 3);
        assert_eq!(record.state(), LoanState::Returned);
    }

    #[test]
    fn due_date_is_fourteen_days_out() {
        let mut b = book(1);
        let now = Utc::now();
        let new = b.lend_to(1, now, loan_period()).unwrap();
        assert_eq!(new.due_date, now + Duration::days(14));
    }

    #[test]
    fn renew_extends_outstanding_record_only() {
        let mut b = book(1);
        let now = Utc::now();
        let mut record = persist(b.lend_to(1, now, loan_period()).unwrap(), 1);

        assert!(record.renew(loan_period()));
        assert_eq!(record.due_date, now + Duration::days(28));
        assert_eq!(b.quantity, 0);

        assert!(b.take_back(&mut record, now));
        let due = record.due_date;
        assert!(!record.renew(loan_period()));
        assert_eq!(record.due_date, due);
    }

    #[test]
    fn return_stamp_is_written_once() {
        let mut b = book(1);
        let now = Utc::now();
        let mut record = persist(b.lend_to(1, now, loan_period()).unwrap(), 1);

        assert!(b.take_back(&mut record, now));
        let stamped = record.return_date;
        assert!(!b.take_back(&mut record, now + Duration::days(1)));
        assert_eq!(record.return_date, stamped);
        assert_eq!(b.quantity, 1);
    }

    #[test]
    fn record_for_another_book_is_not_taken_back() {
        let mut b = book(0);
        let mut record = BorrowRecord {
            id: 1,
            user_id: 1,
            book_id: 99,
            borrow_date: Utc::now(),
            due_date: Utc::now(),
            return_date: None,
        };
        assert!(!b.take_back(&mut record, Utc::now()));
        assert_eq!(b.quantity, 0);
        assert!(record.is_outstanding());
    }

    #[test]
    fn quantity_never_negative_over_a_mixed_sequence() {
        let mut b = book(2);
        let now = Utc::now();
        let mut open: Vec<BorrowRecord> = Vec::new();
        let mut closed: Vec<BorrowRecord> = Vec::new();
        let mut next_id = 1;

        // cycle: borrow, borrow, return, retry return/renew on a returned record
        for step in 0..16 {
            match step % 4 {
                0 | 1 => {
                    if let Some(new) = b.lend_to(step, now, loan_period()) {
                        open.push(persist(new, next_id));
                        next_id += 1;
                    }
                }
                2 => {
                    if let Some(mut r) = open.pop() {
                        assert!(b.take_back(&mut r, now));
                        closed.push(r);
                    }
                }
                _ => {
                    if let Some(r) = closed.last_mut() {
                        assert!(!b.take_back(r, now));
                        assert!(!r.renew(loan_period()));
                    }
                }
            }
            assert!(b.quantity >= 0);
            assert_eq!(b.quantity as usize + open.len(), 2);
        }
    }

    #[test]
    fn state_of_missing_record_is_available() {
        assert_eq!(LoanState::of(None), LoanState::Available);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let t = Transition::unchanged(None);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["status"], "unchanged");
        assert_eq!(json["state"], "available");
        assert!(json["record"].is_null());
        assert_eq!(Outcome::from(true), Outcome::Applied);
    }

    #[test]
    fn transition_reports_state_of_its_record() {
        let mut b = book(1);
        let now = Utc::now();
        let mut record = persist(b.lend_to(1, now, loan_period()).unwrap(), 1);
        assert_eq!(Transition::applied(record.clone()).state, LoanState::OnLoan);

        record.close(now);
        let json = serde_json::to_value(Transition::unchanged(Some(record))).unwrap();
        assert_eq!(json["state"], "returned");
    }
}
