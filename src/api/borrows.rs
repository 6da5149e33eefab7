//! Borrow, renew and return endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        borrow::{BorrowFilter, BorrowRecordDetails, Transition},
        page_number, PAGE_SIZE,
    },
};

use super::AuthenticatedUser;

/// One page of borrow records
#[derive(Serialize, ToSchema)]
pub struct BorrowPage {
    pub items: Vec<BorrowRecordDetails>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Borrow one copy of a book
///
/// Answers 200 either way; `status` is `unchanged` when no copy was left.
#[utoipa::path(
    post,
    path = "/borrow/{book_id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Borrow applied or ignored", body = Transition),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Transition>> {
    let transition = state.services.borrows.borrow(&claims, book_id).await?;
    Ok(Json(transition))
}

/// Extend the due date by another loan period
#[utoipa::path(
    post,
    path = "/renew/{record_id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("record_id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Renewal applied, or ignored for a returned record", body = Transition),
        (status = 403, description = "Record belongs to another reader"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn renew_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(record_id): Path<i32>,
) -> AppResult<Json<Transition>> {
    let transition = state.services.borrows.renew(&claims, record_id).await?;
    Ok(Json(transition))
}

/// Return a borrowed copy
#[utoipa::path(
    post,
    path = "/return/{record_id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("record_id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Return applied, or ignored for a returned record", body = Transition),
        (status = 403, description = "Record belongs to another reader"),
        (status = 404, description = "Record not found")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(record_id): Path<i32>,
) -> AppResult<Json<Transition>> {
    let transition = state.services.borrows.return_book(&claims, record_id).await?;
    Ok(Json(transition))
}

/// The caller's borrow records
#[utoipa::path(
    get,
    path = "/borrows/mine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Outstanding records first", body = Vec<BorrowRecordDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowRecordDetails>>> {
    let records = state.services.borrows.my_borrows(&claims).await?;
    Ok(Json(records))
}

/// All borrow records (librarian)
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowFilter),
    responses(
        (status = 200, description = "Borrow records, newest first", body = BorrowPage),
        (status = 403, description = "Librarians only")
    )
)]
pub async fn list_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<BorrowFilter>,
) -> AppResult<Json<BorrowPage>> {
    claims.require_librarian()?;

    let (items, total) = state.services.borrows.list_borrows(&filter).await?;

    Ok(Json(BorrowPage {
        items,
        total,
        page: page_number(filter.page),
        per_page: PAGE_SIZE,
    }))
}
