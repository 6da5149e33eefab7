//! Authentication service: registration, login, logout, token checks

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, Role, User, UserClaims},
    repository::Repository,
    services::redis::RedisService,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    redis: RedisService,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, redis: RedisService) -> Self {
        Self {
            repository,
            config,
            redis,
        }
    }

    /// Register a new reader account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        let request = request.normalized();
        request.validate()?;

        if self.repository.users.username_exists(&request.username).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.username, request.email.as_deref(), &hash, Some(Role::Reader))
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Registered reader");
        Ok(user)
    }

    /// Authenticate by username and password, returning a bearer token
    pub async fn login(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let role = user
            .login_role()
            .ok_or_else(|| AppError::Authentication("Account has no library role".to_string()))?;

        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role,
            jti: uuid::Uuid::new_v4().to_string(),
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::debug!(user_id = user.id, "Issued access token");
        Ok((token, user))
    }

    /// Revoke the token the claims came from
    pub async fn logout(&self, claims: &UserClaims) -> AppResult<()> {
        let ttl = claims.remaining_seconds(Utc::now().timestamp());
        self.redis.revoke_token(&claims.jti, ttl).await?;
        tracing::debug!(user_id = claims.user_id, "Revoked access token");
        Ok(())
    }

    /// Decode a bearer token and reject revoked ones
    pub async fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        if self.redis.is_token_revoked(&claims.jti).await? {
            return Err(AppError::Authentication("Token has been revoked".to_string()));
        }

        Ok(claims)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
