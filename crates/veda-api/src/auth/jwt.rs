//! HS256 tokens for sessions, email verification and password resets.
//!
//! Each token carries its purpose in the `type` claim and is only accepted for
//! that purpose. Access tokens are signed with `SECRET_KEY`; the single-use
//! email tokens with `SESSION_SECRET`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veda_core::{AppError, Config, User, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    VerifyEmail,
    PasswordReset,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub uid: Uuid,
    pub role: UserRole,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtService {
    access_secret: String,
    session_secret: String,
    access_lifetime: Duration,
}

impl JwtService {
    pub const VERIFY_EMAIL_LIFETIME_HOURS: i64 = 24;
    pub const PASSWORD_RESET_LIFETIME_HOURS: i64 = 1;

    pub fn new(access_secret: String, session_secret: String, access_lifetime: Duration) -> Self {
        Self {
            access_secret,
            session_secret,
            access_lifetime,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.secret_key().to_string(),
            config.session_secret().to_string(),
            Duration::minutes(config.session_lifetime_minutes()),
        )
    }

    /// Lifetime of access tokens in seconds, as reported to clients.
    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime.num_seconds()
    }

    fn lifetime(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_lifetime,
            TokenType::VerifyEmail => Duration::hours(Self::VERIFY_EMAIL_LIFETIME_HOURS),
            TokenType::PasswordReset => Duration::hours(Self::PASSWORD_RESET_LIFETIME_HOURS),
        }
    }

    fn secret(&self, token_type: TokenType) -> &[u8] {
        match token_type {
            TokenType::Access => self.access_secret.as_bytes(),
            TokenType::VerifyEmail | TokenType::PasswordReset => self.session_secret.as_bytes(),
        }
    }

    pub fn issue(&self, user: &User, token_type: TokenType) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            role: user.role,
            token_type,
            iat: now.timestamp(),
            exp: (now + self.lifetime(token_type)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(token_type)),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Decode and check a token, requiring it to be of `expected` type.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(expected)),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })?;

        if data.claims.token_type != expected {
            return Err(AppError::Unauthorized("Invalid token type".to_string()));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veda_core::UserStatus;

    fn service() -> JwtService {
        JwtService::new("a".repeat(32), "b".repeat(32), Duration::minutes(30))
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "sevak@example.org".to_string(),
            username: "sevak".to_string(),
            first_name: None,
            last_name: None,
            mobile: None,
            password_hash: String::new(),
            otp_secret: None,
            otp_expires_at: None,
            role: UserRole::Editor,
            status: UserStatus::Active,
            email_verified: true,
            last_login: None,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let jwt = service();
        let user = user();
        let token = jwt.issue(&user, TokenType::Access).unwrap();

        let claims = jwt.validate(&token, TokenType::Access).unwrap();
        assert_eq!(claims.uid, user.id);
        assert_eq!(claims.sub, "sevak");
        assert_eq!(claims.role, UserRole::Editor);
        assert_eq!(claims.exp - claims.iat, 30 * 60);
        assert_eq!(jwt.access_lifetime_secs(), 1800);
    }

    #[test]
    fn test_token_only_valid_for_its_type() {
        let jwt = service();
        let user = user();

        let reset = jwt.issue(&user, TokenType::PasswordReset).unwrap();
        assert!(jwt.validate(&reset, TokenType::PasswordReset).is_ok());
        // Signed with the session secret, so it does not even verify as an access token.
        assert!(jwt.validate(&reset, TokenType::Access).is_err());
        assert!(jwt.validate(&reset, TokenType::VerifyEmail).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service();
        let user = user();
        let past = Utc::now() - Duration::minutes(5);
        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            role: user.role,
            token_type: TokenType::Access,
            iat: (past - Duration::minutes(30)).timestamp(),
            exp: past.timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret("a".repeat(32).as_bytes()),
        )
        .unwrap();

        let err = jwt.validate(&token, TokenType::Access).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "Token has expired"));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(service().validate("not.a.jwt", TokenType::Access).is_err());
    }
}
