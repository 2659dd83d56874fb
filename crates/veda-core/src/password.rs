//! Password hashing with bcrypt.

use crate::error::AppError;

/// Hash a plaintext password with bcrypt at the default cost.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a plaintext password against a stored bcrypt hash.
///
/// A malformed hash verifies as `false` rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Secr3t!pass").unwrap();
        assert_ne!(hash, "Secr3t!pass");
        assert!(verify_password("Secr3t!pass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
