//! Book (catalog entry) model and related types

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::borrow::{BorrowRecord, NewBorrow};

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub publication_date: Option<NaiveDate>,
    pub price: Decimal,
    pub isbn: String,
    pub category_id: Option<i32>,
    pub description: String,
    /// Copies currently available for lending
    pub quantity: i32,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }

    /// Lend one copy to `user_id`.
    ///
    /// Returns the record to persist, or `None` (and leaves the book
    /// untouched) when no copy is left.
    pub fn lend_to(&mut self, user_id: i32, now: DateTime<Utc>, period: Duration) -> Option<NewBorrow> {
        if !self.is_available() {
            return None;
        }
        self.quantity -= 1;
        Some(NewBorrow {
            user_id,
            book_id: self.id,
            borrow_date: now,
            due_date: now + period,
        })
    }

    /// Take a copy back from an outstanding record.
    ///
    /// Closing an already returned record changes nothing, neither the
    /// record nor the quantity.
    pub fn take_back(&mut self, record: &mut BorrowRecord, now: DateTime<Utc>) -> bool {
        if record.book_id != self.id || !record.close(now) {
            return false;
        }
        self.quantity += 1;
        true
    }
}

/// Catalog search parameters
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Free text, matched against the title
    pub q: Option<String>,
    /// Title substring (case-insensitive)
    pub title: Option<String>,
    /// Author substring (case-insensitive)
    pub author: Option<String>,
    /// ISBN substring
    pub isbn: Option<String>,
    /// Category id
    pub category: Option<i32>,
    /// Page number (1-based)
    pub page: Option<i64>,
}

impl BookQuery {
    /// Non-blank text filters as (column, needle) pairs, in a stable order
    pub fn text_filters(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", self.q.as_deref()),
            ("title", self.title.as_deref()),
            ("author", self.author.as_deref()),
            ("isbn", self.isbn.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            let value = value?.trim();
            (!value.is_empty()).then_some((column, value))
        })
        .collect()
    }
}

/// Create or replace a book (librarian)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Author must be at most 255 characters"))]
    pub author: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "Publisher must be at most 255 characters"))]
    pub publisher: String,
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    #[validate(length(max = 13, message = "ISBN must be at most 13 characters"))]
    pub isbn: String,
    pub category_id: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 4096, message = "Description must be at most 4096 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

impl BookInput {
    pub fn check_price(&self) -> Result<(), String> {
        if self.price.is_sign_negative() {
            return Err("Price cannot be negative".to_string());
        }
        if self.price.normalize().scale() > 2 || self.price >= Decimal::new(100_000, 0) {
            return Err("Price must fit 7 digits with 2 decimals".to_string());
        }
        Ok(())
    }
}
