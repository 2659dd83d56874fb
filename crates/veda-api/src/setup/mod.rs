//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod validation;

use crate::services::ensure_initial_admin;
use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use veda_core::Config;
use veda_infra::{init_telemetry, LogFormat};

/// Validate configuration, connect dependencies and build the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    validation::validate_config(&config).context("Configuration validation failed")?;

    init_telemetry(LogFormat::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        app = %config.app_name(),
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState::new(config, pool, storage));
    if !state.email.is_configured() {
        tracing::warn!("Email service not configured");
    }

    ensure_initial_admin(&state.config, &state.db.user_repository)
        .await
        .context("Failed to create initial admin user")?;

    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
