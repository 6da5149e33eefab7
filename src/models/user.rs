//! User model and related types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Library role. Users without a role exist but cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Librarian,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Librarian => "librarian",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reader" => Ok(Role::Reader),
            "librarian" => Ok(Role::Librarian),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: &str = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// User model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Role a token is issued for; users without one cannot log in
    pub fn login_role(&self) -> Option<Role> {
        self.role
    }
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(
        length(min = 3, max = 150, message = "Username must be 3-150 characters"),
        regex(path = *USERNAME_RE, message = "Username may only contain letters, digits and underscores")
    )]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password2: String,
}

impl RegisterUser {
    /// Treat a blank email field as no email
    pub fn normalized(mut self) -> Self {
        if self.email.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.email = None;
        }
        self
    }
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    /// Token id, used for revocation
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    /// Readers act on their own records; librarians on anyone's
    pub fn require_owner_or_librarian(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization("Not your borrow record".to_string()))
        }
    }

    /// Seconds until expiry, never negative
    pub fn remaining_seconds(&self, now: i64) -> u64 {
        (self.exp - now).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, password: &str, password2: &str) -> RegisterUser {
        RegisterUser {
            username: username.to_string(),
            email: None,
            password: password.to_string(),
            password2: password2.to_string(),
        }
    }

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "bob".into(),
            user_id: 2,
            role,
            jti: "t-1".into(),
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn registration_rules() {
        assert!(register("cindy", "1234", "1234").validate().is_ok());
        assert!(register("@#%", "1234", "1234").validate().is_err());
        assert!(register("cindy", "1234", "5678").validate().is_err());
        assert!(register("cindy", "123", "123").validate().is_err());
        assert!(register("ab", "1234", "1234").validate().is_err());
    }

    #[test]
    fn bad_email_is_rejected() {
        let mut user = register("cindy", "1234", "1234");
        user.email = Some("not-an-email".into());
        assert!(user.validate().is_err());
        user.email = Some("cindy@example.com".into());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn blank_email_counts_as_none() {
        let mut user = register("cindy", "1234", "1234");
        user.email = Some(String::new());
        let user = user.normalized();
        assert_eq!(user.email, None);
        assert!(user.validate().is_ok());

        let mut user = register("cindy", "1234", "1234");
        user.email = Some("  ".into());
        assert_eq!(user.normalized().email, None);

        let mut user = register("cindy", "1234", "1234");
        user.email = Some("cindy@example.com".into());
        assert_eq!(user.normalized().email.as_deref(), Some("cindy@example.com"));
    }

    #[test]
    fn roles_decide_login() {
        let mut user = User {
            id: 1,
            username: "guest".into(),
            email: None,
            password: String::new(),
            role: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.login_role(), None);
        user.role = Some(Role::Reader);
        assert_eq!(user.login_role(), Some(Role::Reader));
        user.role = Some(Role::Librarian);
        assert_eq!(user.login_role(), Some(Role::Librarian));
    }

    #[test]
    fn role_parsing() {
        assert_eq!("Librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(serde_json::to_value(Role::Reader).unwrap(), "reader");
    }

    #[test]
    fn token_round_trip() {
        let c = claims(Role::Reader);
        let token = c.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 2);
        assert_eq!(parsed.role, Role::Reader);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn ownership_checks() {
        let reader = claims(Role::Reader);
        assert!(reader.require_owner_or_librarian(2).is_ok());
        assert!(reader.require_owner_or_librarian(3).is_err());
        assert!(reader.require_librarian().is_err());

        let librarian = claims(Role::Librarian);
        assert!(librarian.require_owner_or_librarian(3).is_ok());
        assert!(librarian.require_librarian().is_ok());
    }

    #[test]
    fn remaining_lifetime_is_clamped() {
        let c = claims(Role::Reader);
        assert_eq!(c.remaining_seconds(c.exp + 10), 0);
        assert_eq!(c.remaining_seconds(c.exp - 10), 10);
    }
}
