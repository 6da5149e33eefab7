//! Business logic services

pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod redis;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, redis_service: redis::RedisService) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config, redis_service),
            catalog: catalog::CatalogService::new(repository.clone()),
            borrows: borrows::BorrowsService::new(repository.clone()),
            repository,
        }
    }
}
