//! Redis service for revoked access tokens

use redis::{AsyncCommands, Client};

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service and check the server answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let service = Self::lazy(url)?;

        let mut conn = service.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(service)
    }

    /// Create the client without connecting; the first command connects
    pub fn lazy(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;
        Ok(Self { client })
    }

    fn revoked_key(jti: &str) -> String {
        format!("revoked_token:{}", jti)
    }

    /// Mark a token id as revoked until the token would have expired anyway
    pub async fn revoke_token(&self, jti: &str, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(Self::revoked_key(jti), "1", ttl_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store revoked token in Redis: {}", e)))?;

        Ok(())
    }

    pub async fn is_token_revoked(&self, jti: &str) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let exists: bool = conn
            .exists(Self::revoked_key(jti))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to check revoked token in Redis: {}", e)))?;

        Ok(exists)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}
