//! User administration. Every handler here requires the admin role.

use crate::auth::password::hash_password;
use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::auth::validate_account;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;
use veda_core::{AppError, NewUser, UserFilter, UserResponse, UserRole, UserStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    /// Generated and emailed to the user when omitted
    pub password: Option<String>,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub mobile: Option<String>,
    pub role: UserRole,
    /// Defaults to `active`
    pub status: Option<UserStatus>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub mobile: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl UpdateUserRequest {
    /// Whether applying this update would leave an admin unable to administer.
    fn demotes_admin(&self) -> bool {
        self.role.is_some_and(|role| role != UserRole::Admin)
            || self.status.is_some_and(|status| status != UserStatus::Active)
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// Random password meeting the strength rules.
fn generate_password() -> String {
    let mut password = Alphanumeric.sample_string(&mut rand::rng(), 16);
    password.push_str("#Aa1");
    password
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(
        ("q" = Option<String>, Query, description = "Matches username, email or name"),
        ("role" = Option<UserRole>, Query, description = "Role"),
        ("status" = Option<UserStatus>, Query, description = "Status"),
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 100)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Page of users", body = UserListResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, filter))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<UserListResponse>, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    let users = &state.db.user_repository;
    let (items, total) = tokio::try_join!(users.list(&filter), users.count(&filter))?;

    Ok(Json(UserListResponse {
        items: items.into_iter().map(UserResponse::from).collect(),
        total,
        limit: filter.limit(),
        offset: filter.offset(),
    }))
}

/// Create a user
///
/// Sends a welcome email. When no password is given one is generated and
/// included in that email.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Username or email already registered", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 422, description = "Invalid fields", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, request), fields(admin_id = %admin.id(), username = %request.username))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    admin.require_role(UserRole::Admin)?;
    request.validate()?;

    let (password, generated) = match request.password {
        Some(password) => (password, false),
        None => (generate_password(), true),
    };

    let username = request.username.trim();
    let email = request.email.trim();
    validate_account(username, email, &password)?;

    let users = &state.db.user_repository;
    if users.exists_username_or_email(username, email).await? {
        return Err(AppError::BadRequest("Username or email already registered".to_string()).into());
    }

    let status = request.status.unwrap_or(UserStatus::Active);
    let user = users
        .create(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: request.first_name,
            last_name: request.last_name,
            mobile: request.mobile,
            password_hash: hash_password(&password).await?,
            role: request.role,
            status,
            email_verified: status == UserStatus::Active,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created by admin");

    let email_service = state.email.clone();
    let recipient = user.clone();
    tokio::spawn(async move {
        let password = generated.then_some(password);
        if let Err(e) = email_service
            .send_welcome_email(&recipient, password.as_deref())
            .await
        {
            tracing::warn!(error = %e, user_id = %recipient.id, "Failed to send welcome email");
        }
    });

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Get a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin))]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    let user = state
        .db
        .user_repository
        .get_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(UserResponse::from(user)))
}

/// Update a user's profile, role or status
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Would remove the last admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, request), fields(admin_id = %admin.id()))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, HttpAppError> {
    admin.require_role(UserRole::Admin)?;
    request.validate()?;

    let users = &state.db.user_repository;
    let target = users.get_by_id(id).await?.ok_or_else(user_not_found)?;

    if target.role == UserRole::Admin
        && request.demotes_admin()
        && users.count_admins().await? <= 1
    {
        return Err(AppError::BadRequest(
            "Cannot demote or deactivate the last admin user".to_string(),
        )
        .into());
    }

    let mut user = target;
    if request.first_name.is_some() || request.last_name.is_some() || request.mobile.is_some() {
        user = users
            .update_profile(id, request.first_name, request.last_name, request.mobile)
            .await?
            .ok_or_else(user_not_found)?;
    }
    if request.role.is_some() || request.status.is_some() {
        user = users
            .update_role_status(id, request.role, request.status)
            .await?
            .ok_or_else(user_not_found)?;
    }

    tracing::info!(user_id = %user.id, role = %user.role, status = %user.status, "User updated");
    Ok(Json(UserResponse::from(user)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Own account or last admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    if admin.id() == id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()).into());
    }

    if !state.db.user_repository.delete(id).await? {
        return Err(user_not_found().into());
    }

    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
