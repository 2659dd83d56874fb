//! Shared helpers for the archive's operator binaries.

use veda_core::validation::{
    is_strong_password, is_valid_email, is_valid_username, PASSWORD_REQUIREMENTS,
};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Check the account fields an operator typed before touching the database.
pub fn validate_admin_input(username: &str, email: &str, password: &str) -> Result<(), String> {
    if !is_valid_username(username) {
        return Err(format!("Invalid username: {}", username));
    }
    if !is_valid_email(email) {
        return Err(format!("Invalid email address: {}", email));
    }
    if !is_strong_password(password) {
        return Err(PASSWORD_REQUIREMENTS.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_admin_input_accepts_good_values() {
        assert!(validate_admin_input("admin", "admin@example.org", "Jaya-Radhe1!").is_ok());
    }

    #[test]
    fn validate_admin_input_rejects_bad_email() {
        let err = validate_admin_input("admin", "admin.example.org", "Jaya-Radhe1!").unwrap_err();
        assert!(err.contains("email"));
    }

    #[test]
    fn validate_admin_input_rejects_weak_password() {
        assert!(validate_admin_input("admin", "admin@example.org", "password").is_err());
    }
}
