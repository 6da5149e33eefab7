//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, categories, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library catalog and borrowing REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Categories
        categories::list_categories,
        categories::create_category,
        categories::rename_category,
        categories::delete_category,
        // Borrows
        borrows::borrow_book,
        borrows::renew_borrow,
        borrows::return_book,
        borrows::my_borrows,
        borrows::list_borrows,
    ),
    components(
        schemas(
            // Auth
            auth::LoginResponse,
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::RegisterUser,
            crate::models::user::LoginRequest,
            // Books
            books::BookPage,
            crate::models::book::Book,
            crate::models::book::BookInput,
            crate::models::book::BookQuery,
            crate::models::category::Category,
            crate::models::category::CategoryInput,
            // Borrows
            borrows::BorrowPage,
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowRecordDetails,
            crate::models::borrow::BorrowFilter,
            crate::models::borrow::LoanState,
            crate::models::borrow::Outcome,
            crate::models::borrow::Transition,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and authentication"),
        (name = "books", description = "Catalog search and book management"),
        (name = "categories", description = "Book categories"),
        (name = "borrows", description = "Borrow, renew and return")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/ready",
            "/auth/register",
            "/auth/login",
            "/auth/logout",
            "/auth/me",
            "/books",
            "/books/{id}",
            "/categories",
            "/categories/{id}",
            "/borrow/{book_id}",
            "/renew/{record_id}",
            "/return/{record_id}",
            "/borrows",
            "/borrows/mine",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
