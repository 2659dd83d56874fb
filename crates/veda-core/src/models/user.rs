use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::otp;

/// Account roles, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Viewer,
    Uploader,
    Editor,
    Admin,
}

impl UserRole {
    pub fn level(self) -> u8 {
        match self {
            UserRole::Viewer => 0,
            UserRole::Uploader => 1,
            UserRole::Editor => 2,
            UserRole::Admin => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Viewer => "viewer",
            UserRole::Uploader => "uploader",
            UserRole::Editor => "editor",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(UserRole::Viewer),
            "uploader" => Ok(UserRole::Uploader),
            "editor" => Ok(UserRole::Editor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "user_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Registered, waiting for email verification
    Pending,
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// Archive account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub otp_secret: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    /// Last time the password was set; reset tokens issued earlier are void.
    #[serde(skip_serializing)]
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "first last" when both names are present, otherwise the username.
    pub fn full_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.username.clone(),
        }
    }

    /// True when the user's role is `required` or higher.
    pub fn has_permission(&self, required: UserRole) -> bool {
        self.role.level() >= required.level()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// True when a reset token issued at `issued_at` (unix seconds) predates
    /// the last password change.
    pub fn password_changed_since(&self, issued_at: i64) -> bool {
        self.password_changed_at.timestamp() > issued_at
    }

    /// Issue a one-time code valid for `expires_in`.
    ///
    /// Every call draws a fresh secret, so codes from earlier requests stop
    /// verifying. The caller persists `otp_secret` and `otp_expires_at`.
    pub fn issue_otp(&mut self, expires_in: Duration, now: DateTime<Utc>) -> Option<String> {
        let secret = otp::generate_otp_secret();
        let code = otp::totp_at(&secret, now.timestamp());
        self.otp_secret = Some(secret);
        self.otp_expires_at = Some(now + expires_in);
        code
    }

    /// Check a one-time code. Expired or never-issued codes always fail.
    pub fn verify_otp(&self, code: &str, now: DateTime<Utc>) -> bool {
        let (Some(secret), Some(expires_at)) = (&self.otp_secret, self.otp_expires_at) else {
            return false;
        };

        if now > expires_at {
            return false;
        }

        otp::verify_totp(secret, code, now.timestamp())
    }
}

/// Public view of a user, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub mobile: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            full_name: user.full_name(),
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            mobile: user.mobile,
            role: user.role,
            status: user.status,
            email_verified: user.email_verified,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Fields required to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
}

/// Admin list filter for users.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserFilter {
    /// Matches username, email, first or last name
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl UserFilter {
    pub fn limit(&self) -> i64 {
        super::clamp_limit(self.limit, 50, 100)
    }

    pub fn offset(&self) -> i64 {
        super::clamp_offset(self.offset)
    }

    pub fn search_pattern(&self) -> Option<String> {
        super::like_pattern(self.q.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "devotee@example.org".to_string(),
            username: "devotee".to_string(),
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
        }
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut u = user(UserRole::Viewer);
        assert_eq!(u.full_name(), "devotee");
        u.first_name = Some("Radha".to_string());
        assert_eq!(u.full_name(), "devotee");
        u.last_name = Some("Devi".to_string());
        assert_eq!(u.full_name(), "Radha Devi");
    }

    #[test]
    fn test_role_hierarchy() {
        let admin = user(UserRole::Admin);
        for role in [
            UserRole::Viewer,
            UserRole::Uploader,
            UserRole::Editor,
            UserRole::Admin,
        ] {
            assert!(admin.has_permission(role));
        }

        let viewer = user(UserRole::Viewer);
        assert!(viewer.has_permission(UserRole::Viewer));
        assert!(!viewer.has_permission(UserRole::Uploader));

        let editor = user(UserRole::Editor);
        assert!(editor.has_permission(UserRole::Uploader));
        assert!(!editor.has_permission(UserRole::Admin));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("uploader".parse::<UserRole>().unwrap(), UserRole::Uploader);
        assert!("superuser".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Editor.to_string(), "editor");
    }

    #[test]
    fn test_is_active() {
        let mut u = user(UserRole::Viewer);
        assert!(u.is_active());
        u.status = UserStatus::Pending;
        assert!(!u.is_active());
    }

    #[test]
    fn test_otp_roundtrip_and_expiry() {
        let mut u = user(UserRole::Viewer);
        let now = Utc::now();
        let code = u.issue_otp(Duration::minutes(15), now).unwrap();
        assert_eq!(code.len(), 6);
        assert!(u.otp_secret.is_some());
        assert!(u.verify_otp(&code, now));

        let later = now + Duration::minutes(16);
        assert!(!u.verify_otp(&code, later));
    }

    #[test]
    fn test_reissued_otp_rejects_earlier_code() {
        let mut u = user(UserRole::Viewer);
        let now = Utc::now();
        let first = u.issue_otp(Duration::minutes(15), now).unwrap();
        let first_secret = u.otp_secret.clone();
        assert!(u.verify_otp(&first, now));

        // Same TOTP window as the first code.
        let later = now + Duration::seconds(30);
        let second = u.issue_otp(Duration::minutes(15), later).unwrap();
        assert_ne!(u.otp_secret, first_secret);
        assert!(u.verify_otp(&second, later));
        if first != second {
            assert!(!u.verify_otp(&first, later));
        }
    }

    #[test]
    fn test_password_changed_since() {
        let mut u = user(UserRole::Viewer);
        let issued_at = u.password_changed_at.timestamp();
        assert!(!u.password_changed_since(issued_at));

        u.password_changed_at += Duration::seconds(5);
        assert!(u.password_changed_since(issued_at));
    }

    #[test]
    fn test_otp_without_secret_fails() {
        let u = user(UserRole::Viewer);
        assert!(!u.verify_otp("123456", Utc::now()));
    }

    #[test]
    fn test_response_excludes_secrets() {
        let mut u = user(UserRole::Viewer);
        u.password_hash = "hash".to_string();
        u.otp_secret = Some("secret".to_string());
        let json = serde_json::to_value(UserResponse::from(u.clone())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("otp_secret").is_none());
        assert_eq!(json["full_name"], "devotee");
        assert_eq!(json["role"], "viewer");

        let raw = serde_json::to_value(&u).unwrap();
        assert!(raw.get("password_hash").is_none());
    }
}
