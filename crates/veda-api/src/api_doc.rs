//! OpenAPI documentation, served at [`crate::constants::OPENAPI_PATH`].

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::{CsrfTokenResponse, MessageResponse, TokenResponse};
use crate::error;
use crate::handlers;
use veda_core::{
    Asset, AssetResponse, AssetStatus, AssetType, AuditAction, AuditLog, UpdateAsset,
    UserResponse, UserRole, UserStatus,
};

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Registers the JWT bearer scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Veda Archive API",
        version = "0.1.0",
        description = "Digital archive for devotional media. Accounts with role-based access, asset upload to S3-compatible storage, search, download and an audit trail. All endpoints are versioned under /api/v1/."
    ),
    paths(
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::admin_login,
        handlers::auth::logout,
        handlers::auth::csrf_token,
        handlers::auth::me,
        handlers::auth::verify_email,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::auth::change_password,
        handlers::auth::request_otp,
        handlers::auth::verify_otp,
        // Assets
        handlers::assets::list_assets,
        handlers::assets::upload_asset,
        handlers::assets::get_asset,
        handlers::assets::download_asset,
        handlers::assets::preview_asset,
        handlers::assets::update_asset,
        handlers::assets::delete_asset,
        // Users
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        // Audit
        handlers::audit_logs::list_audit_logs,
        handlers::audit_logs::export_audit_logs,
        handlers::audit_logs::get_audit_log,
    ),
    components(
        schemas(
            UserResponse,
            UserRole,
            UserStatus,
            Asset,
            AssetResponse,
            AssetType,
            AssetStatus,
            UpdateAsset,
            AuditLog,
            AuditAction,
            TokenResponse,
            CsrfTokenResponse,
            MessageResponse,
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::EmailRequest,
            handlers::auth::ResetPasswordRequest,
            handlers::auth::ChangePasswordRequest,
            handlers::auth::OtpVerifyRequest,
            handlers::assets::AssetListResponse,
            handlers::users::UserListResponse,
            handlers::users::CreateUserRequest,
            handlers::users::UpdateUserRequest,
            handlers::audit_logs::AuditLogListResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, email verification and password recovery"),
        (name = "assets", description = "Archived media upload, search, download and curation"),
        (name = "users", description = "User administration (admin only)"),
        (name = "audit", description = "Audit trail (admin only)")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_versioned_paths() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/v1/auth/token"));
        assert!(spec.paths.paths.contains_key("/api/v1/assets/{id}/download"));
        assert!(spec.paths.paths.contains_key("/api/v1/audit-logs"));
        assert!(spec.paths.paths.contains_key("/api/v1/audit-logs/export"));
        assert!(spec.paths.paths.contains_key("/api/v1/assets/{id}/preview"));
        assert!(spec.paths.paths.contains_key("/api/v1/auth/csrf-token"));
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
