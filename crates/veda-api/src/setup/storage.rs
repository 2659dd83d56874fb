//! Object storage backend selection

use anyhow::{Context, Result};
use std::sync::Arc;
use veda_core::Config;
use veda_storage::{create_storage, Storage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(backend = ?storage.backend_type(), "Storage initialized");
    Ok(storage)
}
