//! Application state shared by every handler.

use crate::auth::{AuthFailureLimiter, JwtService};
use crate::constants::{AUTH_FAILURE_LIMIT, AUTH_FAILURE_WINDOW_SECS};
use crate::services::email::EmailService;
use sqlx::PgPool;
use std::sync::Arc;
use veda_core::Config;
use veda_db::{AssetRepository, AuditLogRepository, UserRepository};
use veda_storage::Storage;

/// Database pool and the repositories built on it.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub user_repository: UserRepository,
    pub asset_repository: AssetRepository,
    pub audit_log_repository: AuditLogRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: UserRepository::new(pool.clone()),
            asset_repository: AssetRepository::new(pool.clone()),
            audit_log_repository: AuditLogRepository::new(pool.clone()),
            pool,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DbState,
    pub storage: Arc<dyn Storage>,
    pub email: EmailService,
    pub jwt: JwtService,
    pub auth_failure_limiter: Arc<AuthFailureLimiter>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, storage: Arc<dyn Storage>) -> Self {
        Self {
            email: EmailService::from_config(&config),
            jwt: JwtService::from_config(&config),
            db: DbState::new(pool),
            storage,
            auth_failure_limiter: Arc::new(AuthFailureLimiter::new(
                AUTH_FAILURE_LIMIT,
                AUTH_FAILURE_WINDOW_SECS,
            )),
            config,
        }
    }
}
