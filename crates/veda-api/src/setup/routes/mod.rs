//! Route configuration and setup.
//!
//! Area route groups live in [domains](domains); health checks in [health](health).

mod domains;
mod health;

use crate::auth::middleware::{auth_middleware, AuthState};
use crate::constants::{ACCESS_TOKEN_COOKIE, OPENAPI_PATH};
use crate::error::HttpAppError;
use crate::middleware::{audit_middleware, rate_limit_middleware, HttpRateLimiter};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use veda_core::{AppError, Config};
use veda_infra::{
    csrf_middleware, request_id_middleware, security_headers_middleware, CsrfConfig, CSRF_HEADER,
};

const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
/// Headroom over the upload limit for multipart framing and text fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the application router with every middleware layer applied.
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let cors = setup_cors(config);
    let rate_limiter = setup_rate_limiter(config);
    let auth_state = Arc::new(AuthState {
        jwt: state.jwt.clone(),
        user_repository: state.db.user_repository.clone(),
        auth_failure_limiter: Some(state.auth_failure_limiter.clone()),
        trusted_proxy_count: config.trusted_proxy_count(),
    });
    let csrf_config = Arc::new(CsrfConfig {
        secret: config.secret_key().to_string(),
        session_cookie: ACCESS_TOKEN_COOKIE,
        max_age_secs: state.jwt.access_lifetime_secs(),
    });

    let protected_routes = Router::new()
        .merge(domains::account_routes())
        .merge(domains::asset_routes())
        .merge(domains::user_routes())
        .merge(domains::audit_log_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            csrf_config,
            csrf_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route("/ready", get(health::readiness_check))
        .route(
            OPENAPI_PATH,
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(domains::public_auth_routes());

    public_routes
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .fallback(not_found)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(
            config.upload_limit_bytes() + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            audit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn not_found() -> HttpAppError {
    HttpAppError(AppError::NotFound(
        "The requested resource was not found".to_string(),
    ))
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_origins().iter().any(|origin| origin == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Cookie sessions need credentials, which rules out wildcard headers.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true)
}

fn setup_rate_limiter(config: &Config) -> Arc<HttpRateLimiter> {
    let rate_limiter = Arc::new(HttpRateLimiter::new(
        config.rate_limit_per_minute(),
        config.trusted_proxy_count(),
    ));

    let rate_limiter_for_cleanup = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter_for_cleanup.cleanup_expired_buckets().await;
        }
    });

    tracing::info!(
        rate_limit_per_minute = config.rate_limit_per_minute(),
        "HTTP rate limiting enabled with automatic bucket cleanup (every 5 minutes)"
    );
    rate_limiter
}
