//! First-run administrator account.

use crate::auth::password::hash_password;
use veda_core::validation::{is_strong_password, is_valid_email, is_valid_username};
use veda_core::{AppError, Config, NewUser, User, UserRole, UserStatus};
use veda_db::UserRepository;

/// Create the configured admin when the users table is empty.
///
/// Requires `ADMIN_EMAIL` and `ADMIN_PASSWORD`; returns the created user, or
/// `None` when accounts already exist or the settings are absent.
pub async fn ensure_initial_admin(
    config: &Config,
    users: &UserRepository,
) -> Result<Option<User>, AppError> {
    let (Some(email), Some(password)) = (config.admin_email(), config.admin_password()) else {
        tracing::debug!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(None);
    };

    if users.count_all().await? > 0 {
        return Ok(None);
    }

    let username = config.admin_username();
    if !is_valid_username(username) || !is_valid_email(email) {
        return Err(AppError::InvalidInput(
            "ADMIN_USERNAME or ADMIN_EMAIL is not valid".to_string(),
        ));
    }
    if !is_strong_password(password) {
        tracing::warn!("ADMIN_PASSWORD does not meet the password policy");
    }

    let password_hash = hash_password(password).await?;

    let admin = users
        .create(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash,
            role: UserRole::Admin,
            status: UserStatus::Active,
            email_verified: true,
        })
        .await?;

    tracing::info!(user_id = %admin.id, username = %admin.username, "Created initial admin user");
    Ok(Some(admin))
}
