//! Borrow records repository.
//!
//! Each transition reads the book and record, applies the model rule, and
//! writes the change in one transaction. Rows are not locked up front, so
//! two concurrent borrows of the last copy can both read `quantity = 1`.
//! The quantity is adjusted relative to the stored value, which makes the
//! second writer hit the `quantity >= 0` CHECK and fail instead of
//! overselling.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::{loan_period, BorrowFilter, BorrowRecord, BorrowRecordDetails, Transition},
        page_offset, PAGE_SIZE,
    },
};

use super::books::BOOK_COLUMNS;

const RECORD_COLUMNS: &str = "id, user_id, book_id, borrow_date, due_date, return_date";

const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.user_id, u.username, r.book_id, b.title AS book_title,
           r.borrow_date, r.due_date, r.return_date,
           (r.return_date IS NULL AND r.due_date < NOW()) AS overdue
    FROM borrow_records r
    JOIN users u ON u.id = r.user_id
    JOIN books b ON b.id = r.book_id
"#;

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &BorrowFilter) {
    qb.push(" WHERE TRUE");

    if let Some(user_id) = filter.user_id {
        qb.push(" AND r.user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(book_id) = filter.book_id {
        qb.push(" AND r.book_id = ");
        qb.push_bind(book_id);
    }
    match filter.outstanding {
        Some(true) => {
            qb.push(" AND r.return_date IS NULL");
        }
        Some(false) => {
            qb.push(" AND r.return_date IS NOT NULL");
        }
        None => {}
    }
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get borrow record by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} FROM borrow_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    /// Lend a copy of `book_id` to `user_id` if one is left
    pub async fn borrow(&self, user_id: i32, book_id: i32, now: DateTime<Utc>) -> AppResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let mut book = sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        let Some(new) = book.lend_to(user_id, now, loan_period()) else {
            return Ok(Transition::unchanged(None));
        };

        sqlx::query("UPDATE books SET quantity = quantity - 1 WHERE id = $1")
            .bind(book.id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, BorrowRecord>(&format!(
            r#"
            INSERT INTO borrow_records (user_id, book_id, borrow_date, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.book_id)
        .bind(new.borrow_date)
        .bind(new.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Transition::applied(record))
    }

    /// Extend the due date of an outstanding record
    pub async fn renew(&self, record_id: i32) -> AppResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let mut record = sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} FROM borrow_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", record_id)))?;

        if !record.renew(loan_period()) {
            return Ok(Transition::unchanged(Some(record)));
        }

        sqlx::query("UPDATE borrow_records SET due_date = $1 WHERE id = $2")
            .bind(record.due_date)
            .bind(record.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::applied(record))
    }

    /// Close an outstanding record and put the copy back on the shelf
    pub async fn return_record(&self, record_id: i32, now: DateTime<Utc>) -> AppResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let mut record = sqlx::query_as::<_, BorrowRecord>(&format!(
            "SELECT {} FROM borrow_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", record_id)))?;

        let mut book = sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(record.book_id)
            .fetch_one(&mut *tx)
            .await?;

        if !book.take_back(&mut record, now) {
            return Ok(Transition::unchanged(Some(record)));
        }

        let closed = sqlx::query(
            "UPDATE borrow_records SET return_date = $1 WHERE id = $2 AND return_date IS NULL",
        )
        .bind(record.return_date)
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

        // closed by a concurrent return since we read it
        if closed.rows_affected() == 0 {
            let current = sqlx::query_as::<_, BorrowRecord>(&format!(
                "SELECT {} FROM borrow_records WHERE id = $1",
                RECORD_COLUMNS
            ))
            .bind(record_id)
            .fetch_one(&mut *tx)
            .await?;
            return Ok(Transition::unchanged(Some(current)));
        }

        sqlx::query("UPDATE books SET quantity = quantity + 1 WHERE id = $1")
            .bind(book.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::applied(record))
    }

    /// Records of one borrower, outstanding first, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowRecordDetails>> {
        let records = sqlx::query_as::<_, BorrowRecordDetails>(&format!(
            "{} WHERE r.user_id = $1 ORDER BY (r.return_date IS NULL) DESC, r.borrow_date DESC, r.id DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// All records matching the filter, one page at a time
    pub async fn search(&self, filter: &BorrowFilter) -> AppResult<(Vec<BorrowRecordDetails>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM borrow_records r");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        push_filters(&mut select, filter);
        select.push(" ORDER BY r.borrow_date DESC, r.id DESC LIMIT ");
        select.push_bind(PAGE_SIZE);
        select.push(" OFFSET ");
        select.push_bind(page_offset(filter.page));

        let records = select
            .build_query_as::<BorrowRecordDetails>()
            .fetch_all(&self.pool)
            .await?;

        Ok((records, total))
    }
}
