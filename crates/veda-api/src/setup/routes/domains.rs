//! Route groups per API area. Paths are relative to [`API_PREFIX`].

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

fn api(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Endpoints reachable without a session.
pub fn public_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(&api("/auth/register"), post(handlers::auth::register))
        .route(&api("/auth/token"), post(handlers::auth::login))
        .route(&api("/auth/logout"), post(handlers::auth::logout))
        .route(&api("/auth/csrf-token"), get(handlers::auth::csrf_token))
        .route(
            &api("/auth/verify-email/{token}"),
            post(handlers::auth::verify_email),
        )
        .route(
            &api("/auth/forgot-password"),
            post(handlers::auth::forgot_password),
        )
        .route(
            &api("/auth/reset-password"),
            post(handlers::auth::reset_password),
        )
        .route(&api("/auth/otp/request"), post(handlers::auth::request_otp))
        .route(&api("/auth/otp/verify"), post(handlers::auth::verify_otp))
        .route(&api("/admin/login"), post(handlers::auth::admin_login))
}

pub fn account_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(&api("/auth/me"), get(handlers::auth::me))
        .route(
            &api("/auth/change-password"),
            post(handlers::auth::change_password),
        )
}

pub fn asset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &api("/assets"),
            get(handlers::assets::list_assets).post(handlers::assets::upload_asset),
        )
        .route(
            &api("/assets/{id}"),
            get(handlers::assets::get_asset)
                .patch(handlers::assets::update_asset)
                .delete(handlers::assets::delete_asset),
        )
        .route(
            &api("/assets/{id}/download"),
            get(handlers::assets::download_asset),
        )
        .route(
            &api("/assets/{id}/preview"),
            get(handlers::assets::preview_asset),
        )
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &api("/users"),
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            &api("/users/{id}"),
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
}

pub fn audit_log_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &api("/audit-logs"),
            get(handlers::audit_logs::list_audit_logs),
        )
        .route(
            &api("/audit-logs/export"),
            get(handlers::audit_logs::export_audit_logs),
        )
        .route(
            &api("/audit-logs/{id}"),
            get(handlers::audit_logs::get_audit_log),
        )
}
