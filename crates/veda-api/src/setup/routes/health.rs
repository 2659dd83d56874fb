//! Health, liveness and readiness probes.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    pub status: &'static str,
    pub app: String,
    pub environment: String,
    pub version: &'static str,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: state.config.app_name().to_string(),
        environment: state.config.environment().to_string(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - the database answers within the timeout.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match tokio::time::timeout(
        READINESS_TIMEOUT,
        sqlx::query("SELECT 1").execute(&state.db.pool),
    )
    .await
    {
        Ok(Ok(_)) => "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database readiness check failed");
            format!("not_ready: {}", e)
        }
        Err(_) => {
            tracing::error!("Database readiness check timed out");
            "timeout".to_string()
        }
    };

    let (status_code, status) = if database == "ready" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(serde_json::json!({ "status": status, "database": database })),
    )
}
