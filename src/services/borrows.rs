//! Borrow lifecycle service.
//!
//! Failed preconditions (no copy left, record already returned) are not
//! errors: the caller gets `Outcome::Unchanged` and nothing is written.

use chrono::Utc;

use crate::{
    error::AppResult,
    models::{
        borrow::{BorrowFilter, BorrowRecordDetails, Outcome, Transition},
        user::UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
}

impl BorrowsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow one copy of a book for the caller
    pub async fn borrow(&self, claims: &UserClaims, book_id: i32) -> AppResult<Transition> {
        let transition = self
            .repository
            .borrows
            .borrow(claims.user_id, book_id, Utc::now())
            .await?;

        match (&transition.status, &transition.record) {
            (Outcome::Applied, Some(record)) => tracing::info!(
                record_id = record.id,
                user_id = claims.user_id,
                book_id,
                due_date = %record.due_date,
                "Book borrowed"
            ),
            _ => tracing::debug!(user_id = claims.user_id, book_id, "Borrow ignored: no copy available"),
        }

        Ok(transition)
    }

    /// Extend the due date of one of the caller's records
    pub async fn renew(&self, claims: &UserClaims, record_id: i32) -> AppResult<Transition> {
        let record = self.repository.borrows.get_by_id(record_id).await?;
        claims.require_owner_or_librarian(record.user_id)?;

        let transition = self.repository.borrows.renew(record_id).await?;

        match transition.status {
            Outcome::Applied => tracing::info!(record_id, user_id = claims.user_id, "Borrow renewed"),
            Outcome::Unchanged => tracing::debug!(record_id, "Renew ignored: record already returned"),
        }

        Ok(transition)
    }

    /// Return the copy held by one of the caller's records
    pub async fn return_book(&self, claims: &UserClaims, record_id: i32) -> AppResult<Transition> {
        let record = self.repository.borrows.get_by_id(record_id).await?;
        claims.require_owner_or_librarian(record.user_id)?;

        let transition = self
            .repository
            .borrows
            .return_record(record_id, Utc::now())
            .await?;

        match transition.status {
            Outcome::Applied => tracing::info!(
                record_id,
                book_id = record.book_id,
                user_id = claims.user_id,
                "Book returned"
            ),
            Outcome::Unchanged => tracing::debug!(record_id, "Return ignored: record already returned"),
        }

        Ok(transition)
    }

    /// The caller's own records
    pub async fn my_borrows(&self, claims: &UserClaims) -> AppResult<Vec<BorrowRecordDetails>> {
        self.repository.borrows.list_for_user(claims.user_id).await
    }

    /// All records (librarian)
    pub async fn list_borrows(&self, filter: &BorrowFilter) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        self.repository.borrows.search(filter).await
    }
}
