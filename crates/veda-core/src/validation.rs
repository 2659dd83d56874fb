//! Input validation for account fields.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").expect("valid username regex"));

pub const PASSWORD_REQUIREMENTS: &str = "Password must be at least 8 characters long and contain an uppercase letter, a lowercase letter, a digit and a special character";

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// At least 8 characters with upper, lower, digit and one non-alphanumeric.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("archive@veda.org"));
        assert!(is_valid_email("first.last+tag@mail.example.co"));
        assert!(!is_valid_email("no-at-sign.org"));
        assert!(!is_valid_email("user@host"));
        assert!(!is_valid_email("user@host.c"));
    }

    #[test]
    fn test_username() {
        assert!(is_valid_username("bhakti_das"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(51)));
    }

    #[test]
    fn test_strong_password() {
        assert!(is_strong_password("Hari-b0l!"));
        assert!(!is_strong_password("Sh0rt!"));
        assert!(!is_strong_password("alllowercase1!"));
        assert!(!is_strong_password("ALLUPPERCASE1!"));
        assert!(!is_strong_password("NoDigitsHere!"));
        assert!(!is_strong_password("NoSpecial123"));
    }
}
