use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kinds of recorded actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "audit_action", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserLogin,
    UserLogout,
    UserCreate,
    UserUpdate,
    UserDelete,
    UserPasswordChange,
    UserPasswordReset,
    AssetUpload,
    AssetUpdate,
    AssetDelete,
    AssetDownload,
    Read,
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserLogin => "USER_LOGIN",
            AuditAction::UserLogout => "USER_LOGOUT",
            AuditAction::UserCreate => "USER_CREATE",
            AuditAction::UserUpdate => "USER_UPDATE",
            AuditAction::UserDelete => "USER_DELETE",
            AuditAction::UserPasswordChange => "USER_PASSWORD_CHANGE",
            AuditAction::UserPasswordReset => "USER_PASSWORD_RESET",
            AuditAction::AssetUpload => "ASSET_UPLOAD",
            AuditAction::AssetUpdate => "ASSET_UPDATE",
            AuditAction::AssetDelete => "ASSET_DELETE",
            AuditAction::AssetDownload => "ASSET_DOWNLOAD",
            AuditAction::Read => "READ",
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit trail. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub status_code: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Audit row under construction.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub status_code: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
}

impl NewAuditLog {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            target_type: None,
            target_id: None,
            status_code: None,
            ip_address: None,
            user_agent: None,
            error_message: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_target(mut self, target_type: impl Into<String>, target_id: Option<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = target_id;
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code as i32);
        self
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Read-only audit log query.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AuditLogFilter {
    pub action: Option<AuditAction>,
    pub user_id: Option<Uuid>,
    /// Username of the acting user
    pub username: Option<String>,
    pub target_type: Option<String>,
    pub status_code: Option<i32>,
    /// Entries created at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Entries created before this instant
    pub to: Option<DateTime<Utc>>,
    /// Matches action, target type, IP address, user agent and error message
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AuditLogFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    /// Rows written by a single CSV export
    pub const EXPORT_MAX_ROWS: i64 = 10_000;

    pub fn limit(&self) -> i64 {
        super::clamp_limit(self.limit, Self::DEFAULT_LIMIT, 200)
    }

    pub fn offset(&self) -> i64 {
        super::clamp_offset(self.offset)
    }

    pub fn search_pattern(&self) -> Option<String> {
        super::like_pattern(self.q.as_deref())
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuditAction::UserPasswordReset).unwrap(),
            "\"USER_PASSWORD_RESET\""
        );
        assert_eq!(AuditAction::AssetDownload.to_string(), "ASSET_DOWNLOAD");
        let parsed: AuditAction = serde_json::from_str("\"READ\"").unwrap();
        assert_eq!(parsed, AuditAction::Read);
    }

    #[test]
    fn test_builder() {
        let user_id = Uuid::new_v4();
        let entry = NewAuditLog::new(AuditAction::AssetDelete)
            .with_user(Some(user_id))
            .with_target("asset", Some("abc".to_string()))
            .with_status(204);
        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.target_type.as_deref(), Some("asset"));
        assert_eq!(entry.status_code, Some(204));
        assert!(entry.metadata.is_object());
    }

    #[test]
    fn test_filter_limits() {
        assert_eq!(AuditLogFilter::default().limit(), 50);
        let filter = AuditLogFilter {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(filter.limit(), 200);
    }

    #[test]
    fn test_filter_search_and_username() {
        let filter = AuditLogFilter {
            q: Some(" 10.0_ ".to_string()),
            username: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%10.0\\_%"));
        assert_eq!(filter.username(), None);
        assert_eq!(AuditLogFilter::default().search_pattern(), None);
    }
}
