//! bcrypt on the blocking pool, keeping runtime workers free during hashing.

use veda_core::AppError;

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || veda_core::password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

pub async fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || veda_core::password::verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}
