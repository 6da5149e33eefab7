//! API handlers for Libris REST endpoints

pub mod auth;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    RequestPartsExt, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing or malformed bearer token".to_string()))?;

        let claims = state.services.auth.verify_token(bearer.token()).await?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route(
            "/categories/:id",
            put(categories::rename_category).delete(categories::delete_category),
        )
        // Borrow lifecycle
        .route("/borrow/:book_id", post(borrows::borrow_book))
        .route("/renew/:record_id", post(borrows::renew_borrow))
        .route("/return/:record_id", post(borrows::return_book))
        .route("/borrows", get(borrows::list_borrows))
        .route("/borrows/mine", get(borrows::my_borrows))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{config::AppConfig, repository::Repository, services::{redis::RedisService, Services}};

    // Lazily connected pool and Redis client: nothing here talks to a server
    fn test_app() -> Router {
        let config = AppConfig::default();
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&config.database.url)
            .unwrap();
        let redis = RedisService::lazy(&config.redis.url).unwrap();
        let services = Services::new(Repository::new(pool), config.auth.clone(), redis);

        create_router(AppState {
            services: Arc::new(services),
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_without_backends() {
        let response = test_app()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn borrowing_requires_a_token() {
        let response = test_app()
            .oneshot(Request::post("/api/v1/borrow/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "NotAuthorized");
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::post("/api/v1/return/1")
                    .header(AUTHORIZATION, "Bearer not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let response = test_app()
            .oneshot(
                Request::get("/api/v1/borrows/mine")
                    .header(AUTHORIZATION, "Basic Ym9iOjEyMzQ=")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = test_app()
            .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/borrow/{book_id}"]["post"].is_object());
        assert!(doc["paths"]["/books"]["get"].is_object());
    }
}
