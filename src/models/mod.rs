//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookQuery};
pub use borrow::{BorrowRecord, BorrowRecordDetails, LoanState, Outcome};
pub use category::Category;
pub use user::{Role, User, UserClaims};

/// Fixed number of rows per listing page
pub const PAGE_SIZE: i64 = 10;

/// 1-based page number; missing or non-positive values mean the first page
pub fn page_number(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Row offset of the given page
pub fn page_offset(page: Option<i64>) -> i64 {
    (page_number(page) - 1).saturating_mul(PAGE_SIZE)
}
