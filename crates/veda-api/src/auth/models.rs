use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use veda_core::{AppError, User, UserRole};

pub const INSUFFICIENT_PRIVILEGES: &str = "The user doesn't have enough privileges";

/// Authenticated account, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    /// Fail with 403 unless the user holds `required` or a higher role.
    pub fn require_role(&self, required: UserRole) -> Result<(), AppError> {
        if self.0.has_permission(required) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.0.id,
                role = %self.0.role,
                required = %required,
                "Insufficient privileges"
            );
            Err(AppError::Forbidden(INSUFFICIENT_PRIVILEGES.to_string()))
        }
    }
}

// Read straight from the parts so it composes with body extractors such as Multipart.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Could not validate credentials".to_string(),
                ))
            })
    }
}

/// Response extension naming the authenticated user, read by the audit middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUserId(pub Uuid);

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    /// Echo in `X-CSRF-Token` when authenticating with the session cookie
    pub csrf_token: String,
}

/// Fresh CSRF token; the same value is set in the `csrf_token` cookie.
#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veda_core::UserStatus;

    fn current(role: UserRole) -> CurrentUser {
        let now = Utc::now();
        CurrentUser(User {
            id: Uuid::new_v4(),
            email: "pujari@example.org".to_string(),
            username: "pujari".to_string(),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash: String::new(),
            otp_secret: None,
            otp_expires_at: None,
            role,
            status: UserStatus::Active,
            email_verified: true,
            last_login: None,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    #[test]
    fn test_require_role() {
        assert!(current(UserRole::Admin).require_role(UserRole::Editor).is_ok());
        assert!(current(UserRole::Uploader)
            .require_role(UserRole::Uploader)
            .is_ok());

        let err = current(UserRole::Viewer)
            .require_role(UserRole::Uploader)
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg == INSUFFICIENT_PRIVILEGES));
    }
}
