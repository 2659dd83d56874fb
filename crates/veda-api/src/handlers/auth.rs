//! Account registration, login, email verification and password recovery.

use crate::auth::cookie::{clear_session_cookie, new_csrf_cookie, session_cookie};
use crate::auth::models::INSUFFICIENT_PRIVILEGES;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{CsrfTokenResponse, CurrentUser, MessageResponse, TokenResponse, TokenType};
use crate::error::{ErrorResponse, HttpAppError, JsonOrForm, ValidatedJson};
use crate::state::AppState;
use crate::utils::ip_extraction::ClientIp;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;
use veda_core::validation::{
    is_strong_password, is_valid_email, is_valid_username, PASSWORD_REQUIREMENTS,
};
use veda_core::{AppError, NewUser, User, UserResponse, UserRole, UserStatus};

const INCORRECT_CREDENTIALS: &str = "Incorrect username or password";
const ACCOUNT_NOT_ACTIVE: &str = "Account is not active. Please check your email for verification.";
const RESET_LINK_SENT: &str = "If your email is registered, you will receive a password reset link";
const OTP_SENT: &str = "If your email is registered, you will receive a one-time login code";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub mobile: Option<String>,
}

/// Login form; `username` may also be the account email.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub otp: String,
}

/// Username, email and password rules shared by self-registration and admin creation.
pub(crate) fn validate_account(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    if !is_valid_username(username) {
        return Err(AppError::Validation(
            "Username must be 3-50 characters of letters, digits, '_', '.' or '-'".to_string(),
        ));
    }
    if !is_valid_email(email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    validate_new_password(password)
}

fn validate_new_password(password: &str) -> Result<(), AppError> {
    if is_strong_password(password) {
        Ok(())
    } else {
        Err(AppError::Validation(PASSWORD_REQUIREMENTS.to_string()))
    }
}

/// Check credentials for `identifier` (username or email), counting failures per IP.
async fn authenticate(
    state: &AppState,
    client_ip: &str,
    identifier: &str,
    password: &str,
) -> Result<User, AppError> {
    let limiter = &state.auth_failure_limiter;
    if limiter.is_blocked(client_ip).await {
        return Err(crate::auth::AuthFailureLimiter::blocked_error());
    }

    let user = state
        .db
        .user_repository
        .get_by_username_or_email(identifier.trim())
        .await?;

    let user = match user {
        Some(user) if verify_password(password, &user.password_hash).await => user,
        _ => {
            limiter.record_failure(client_ip).await;
            tracing::info!(client_ip = %client_ip, "Failed login attempt");
            return Err(AppError::Unauthorized(INCORRECT_CREDENTIALS.to_string()));
        }
    };

    if !user.is_active() {
        return Err(AppError::Forbidden(ACCOUNT_NOT_ACTIVE.to_string()));
    }

    limiter.reset(client_ip).await;
    Ok(user)
}

/// Issue an access token, set the session cookie and record the login time.
async fn start_session(state: &AppState, user: &User) -> Result<Response, AppError> {
    let token = state.jwt.issue(user, TokenType::Access)?;
    let expires_in = state.jwt.access_lifetime_secs();

    let secure = !state.config.debug();
    let (csrf_token, csrf_cookie) = new_csrf_cookie(state.config.secret_key(), expires_in, secure)?;

    state.db.user_repository.touch_last_login(user.id).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");

    let mut response = Json(TokenResponse {
        access_token: token.clone(),
        token_type: "bearer".to_string(),
        expires_in,
        csrf_token,
    })
    .into_response();

    let headers = response.headers_mut();
    if let Some(cookie) = session_cookie(&token, expires_in, secure) {
        headers.append(header::SET_COOKIE, cookie);
    }
    headers.append(header::SET_COOKIE, csrf_cookie);
    Ok(response)
}

fn spawn_email<F>(description: &'static str, send: F)
where
    F: std::future::Future<Output = Result<bool, AppError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = send.await {
            tracing::warn!(error = %e, email = description, "Failed to send email");
        }
    });
}

/// Register a new account
///
/// The account starts as a pending viewer and becomes active once the email
/// address is verified.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Username or email already registered", body = ErrorResponse),
        (status = 422, description = "Invalid fields", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let username = request.username.trim();
    let email = request.email.trim();
    validate_account(username, email, &request.password)?;

    let users = &state.db.user_repository;
    if users.exists_username_or_email(username, email).await? {
        return Err(AppError::BadRequest("Username or email already registered".to_string()).into());
    }

    let user = users
        .create(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: request.first_name,
            last_name: request.last_name,
            mobile: request.mobile,
            password_hash: hash_password(&request.password).await?,
            role: UserRole::Viewer,
            status: UserStatus::Pending,
            email_verified: false,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let token = state.jwt.issue(&user, TokenType::VerifyEmail)?;
    let email_service = state.email.clone();
    let recipient = user.clone();
    spawn_email("verification", async move {
        email_service.send_verification_email(&recipient, &token).await
    });

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Log in with username (or email) and password
///
/// Accepts JSON or an OAuth2 password form. Sets the `access_token` cookie.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
        (status = 403, description = "Account not active", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, form))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonOrForm(form): JsonOrForm<LoginRequest>,
) -> Result<Response, HttpAppError> {
    let user = authenticate(&state, &client_ip, &form.username, &form.password).await?;
    Ok(start_session(&state, &user).await?)
}

/// Log in to the administration area; only admins may pass.
#[utoipa::path(
    post,
    path = "/api/v1/admin/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Incorrect username or password", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, form))]
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonOrForm(form): JsonOrForm<LoginRequest>,
) -> Result<Response, HttpAppError> {
    let user = authenticate(&state, &client_ip, &form.username, &form.password).await?;
    if user.role != UserRole::Admin {
        tracing::warn!(user_id = %user.id, "Non-admin attempted admin login");
        return Err(AppError::Forbidden(INSUFFICIENT_PRIVILEGES.to_string()).into());
    }
    Ok(start_session(&state, &user).await?)
}

/// Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::new("Successfully logged out")),
    )
}

/// Issue a CSRF token for cookie sessions
///
/// Browsers using the session cookie send this value in `X-CSRF-Token` on
/// every POST, PATCH and DELETE.
#[utoipa::path(
    get,
    path = "/api/v1/auth/csrf-token",
    tag = "auth",
    responses((status = 200, description = "Token issued", body = CsrfTokenResponse))
)]
pub async fn csrf_token(State(state): State<Arc<AppState>>) -> Result<Response, HttpAppError> {
    let (csrf_token, cookie) = new_csrf_cookie(
        state.config.secret_key(),
        state.jwt.access_lifetime_secs(),
        !state.config.debug(),
    )?;
    Ok(([(header::SET_COOKIE, cookie)], Json(CsrfTokenResponse { csrf_token })).into_response())
}

/// Current account
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Confirm an email address with the token from the verification email
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-email/{token}",
    tag = "auth",
    params(("token" = String, Path, description = "Verification token")),
    responses(
        (status = 200, description = "Verified or already verified", body = MessageResponse),
        (status = 400, description = "Invalid token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let claims = state
        .jwt
        .validate(&token, TokenType::VerifyEmail)
        .map_err(|_| AppError::BadRequest("Invalid token".to_string()))?;

    let users = &state.db.user_repository;
    let user = users
        .get_by_id(claims.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.email_verified {
        return Ok(Json(MessageResponse::new("Email already verified")));
    }

    users.set_status_verified(user.id).await?;
    tracing::info!(user_id = %user.id, "Email verified");
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Request a password reset link
///
/// The response is the same whether or not the address is registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "auth",
    request_body = EmailRequest,
    responses((status = 200, description = "Request accepted", body = MessageResponse))
)]
#[tracing::instrument(skip(state, request))]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let user = state
        .db
        .user_repository
        .get_by_email(request.email.trim())
        .await?;

    if let Some(user) = user.filter(|u| u.status != UserStatus::Suspended) {
        let token = state.jwt.issue(&user, TokenType::PasswordReset)?;
        let email_service = state.email.clone();
        spawn_email("password_reset", async move {
            email_service
                .send_password_reset_email(&user, &token, Some(&client_ip))
                .await
        });
    }

    Ok(Json(MessageResponse::new(RESET_LINK_SENT)))
}

/// Set a new password using a reset token
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let invalid = || AppError::BadRequest("Invalid or expired token".to_string());
    let claims = state
        .jwt
        .validate(&request.token, TokenType::PasswordReset)
        .map_err(|_| invalid())?;

    let users = &state.db.user_repository;
    let user = users
        .get_by_id(claims.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Tokens issued before the last password change are spent.
    if user.password_changed_since(claims.iat) {
        return Err(invalid().into());
    }

    validate_new_password(&request.new_password)?;
    users
        .set_password(user.id, &hash_password(&request.new_password).await?)
        .await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Change the password of the logged-in account
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Current password is incorrect", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    if !verify_password(&request.current_password, &user.0.password_hash).await {
        return Err(AppError::BadRequest("Incorrect password".to_string()).into());
    }
    validate_new_password(&request.new_password)?;

    state
        .db
        .user_repository
        .set_password(user.id(), &hash_password(&request.new_password).await?)
        .await?;

    tracing::info!("Password changed");
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Email a one-time login code
#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/request",
    tag = "auth",
    request_body = EmailRequest,
    responses((status = 200, description = "Request accepted", body = MessageResponse))
)]
#[tracing::instrument(skip(state, request))]
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    let users = &state.db.user_repository;
    let user = users.get_by_email(request.email.trim()).await?;

    if let Some(mut user) = user.filter(User::is_active) {
        let expire_minutes = state.config.otp_expire_minutes();
        let code = user
            .issue_otp(Duration::minutes(expire_minutes), Utc::now())
            .ok_or_else(|| AppError::Internal("Failed to generate one-time code".to_string()))?;

        if let (Some(secret), Some(expires_at)) = (&user.otp_secret, user.otp_expires_at) {
            users.set_otp(user.id, secret, expires_at).await?;
        }

        let email_service = state.email.clone();
        spawn_email("otp", async move {
            email_service
                .send_otp_email(&user, &code, expire_minutes)
                .await
        });
    }

    Ok(Json(MessageResponse::new(OTP_SENT)))
}

/// Log in with a one-time code
#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/verify",
    tag = "auth",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid or expired code", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request))]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<OtpVerifyRequest>,
) -> Result<Response, HttpAppError> {
    let limiter = &state.auth_failure_limiter;
    if limiter.is_blocked(&client_ip).await {
        return Err(crate::auth::AuthFailureLimiter::blocked_error().into());
    }

    let users = &state.db.user_repository;
    let user = users
        .get_by_email(request.email.trim())
        .await?
        .filter(|user| user.verify_otp(&request.otp, Utc::now()));

    let Some(user) = user else {
        limiter.record_failure(&client_ip).await;
        return Err(AppError::Unauthorized("Invalid or expired code".to_string()).into());
    };

    if !user.is_active() {
        return Err(AppError::Forbidden(ACCOUNT_NOT_ACTIVE.to_string()).into());
    }

    users.clear_otp(user.id).await?;
    limiter.reset(&client_ip).await;
    Ok(start_session(&state, &user).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_account() {
        assert!(validate_account("radha_devi", "radha@example.org", "Hari-b0l!").is_ok());
        assert!(matches!(
            validate_account("x", "radha@example.org", "Hari-b0l!"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_account("radha_devi", "not-an-email", "Hari-b0l!"),
            Err(AppError::Validation(msg)) if msg == "Invalid email address"
        ));
        assert!(matches!(
            validate_account("radha_devi", "radha@example.org", "weak"),
            Err(AppError::Validation(msg)) if msg == PASSWORD_REQUIREMENTS
        ));
    }
}
