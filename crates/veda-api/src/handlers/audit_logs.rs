//! Read-only access to the audit trail for administrators.

use crate::auth::CurrentUser;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use veda_core::{AppError, AuditAction, AuditLog, AuditLogFilter, UserRole};

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

const CSV_COLUMNS: [&str; 11] = [
    "id",
    "created_at",
    "action",
    "user_id",
    "target_type",
    "target_id",
    "status_code",
    "ip_address",
    "user_agent",
    "error_message",
    "metadata",
];

/// Render entries as CSV with a header row.
pub(crate) fn audit_logs_csv(entries: &[AuditLog]) -> Result<Vec<u8>, AppError> {
    let csv_error = |e: csv::Error| AppError::Internal(format!("Failed to write CSV: {}", e));
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS).map_err(csv_error)?;
    for entry in entries {
        writer
            .write_record([
                entry.id.to_string(),
                entry.created_at.to_rfc3339(),
                entry.action.to_string(),
                entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
                optional(&entry.target_type),
                optional(&entry.target_id),
                entry.status_code.map(|c| c.to_string()).unwrap_or_default(),
                optional(&entry.ip_address),
                optional(&entry.user_agent),
                optional(&entry.error_message),
                entry.metadata.to_string(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to write CSV: {}", e)))
}

/// List audit log entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    tag = "audit",
    params(
        ("action" = Option<AuditAction>, Query, description = "Action, e.g. USER_LOGIN"),
        ("user_id" = Option<Uuid>, Query, description = "Acting user"),
        ("username" = Option<String>, Query, description = "Username of the acting user"),
        ("target_type" = Option<String>, Query, description = "user or asset"),
        ("status_code" = Option<i32>, Query, description = "HTTP status of the response"),
        ("from" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Created before (RFC 3339)"),
        ("q" = Option<String>, Query, description = "Search action, target type, IP, user agent and error"),
        ("limit" = Option<i64>, Query, description = "Page size (default 50, max 200)"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, description = "Page of entries", body = AuditLogListResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, filter))]
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Query(filter): Query<AuditLogFilter>,
) -> Result<Json<AuditLogListResponse>, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    let repository = &state.db.audit_log_repository;
    let (items, total) = tokio::try_join!(repository.list(&filter), repository.count(&filter))?;

    Ok(Json(AuditLogListResponse {
        items,
        total,
        limit: filter.limit(),
        offset: filter.offset(),
    }))
}

/// Export matching audit log entries as CSV
///
/// Takes the list filters; `limit` and `offset` are ignored and at most
/// 10 000 rows are written.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/export",
    tag = "audit",
    params(
        ("action" = Option<AuditAction>, Query, description = "Action, e.g. USER_LOGIN"),
        ("user_id" = Option<Uuid>, Query, description = "Acting user"),
        ("username" = Option<String>, Query, description = "Username of the acting user"),
        ("target_type" = Option<String>, Query, description = "user or asset"),
        ("status_code" = Option<i32>, Query, description = "HTTP status of the response"),
        ("from" = Option<String>, Query, description = "Created at or after (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Created before (RFC 3339)"),
        ("q" = Option<String>, Query, description = "Search action, target type, IP, user agent and error")
    ),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin, filter))]
pub async fn export_audit_logs(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Query(filter): Query<AuditLogFilter>,
) -> Result<impl IntoResponse, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    let entries = state
        .db
        .audit_log_repository
        .export(&filter, AuditLogFilter::EXPORT_MAX_ROWS)
        .await?;
    let body = audit_logs_csv(&entries)?;

    tracing::info!(rows = entries.len(), "Audit logs exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"audit-logs.csv\"",
            ),
        ],
        body,
    ))
}

/// Get one audit log entry
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs/{id}",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry", body = AuditLog),
        (status = 404, description = "Entry not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, admin))]
pub async fn get_audit_log(
    State(state): State<Arc<AppState>>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditLog>, HttpAppError> {
    admin.require_role(UserRole::Admin)?;

    let entry = state
        .db
        .audit_log_repository
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Audit log entry not found".to_string()))?;
    Ok(Json(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_csv_quotes_fields_and_flattens_metadata() {
        let entry = AuditLog {
            id: Uuid::nil(),
            action: AuditAction::UserLogin,
            user_id: None,
            target_type: None,
            target_id: None,
            status_code: Some(401),
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: Some("curl/8.0, test".to_string()),
            error_message: Some("Incorrect username or password".to_string()),
            metadata: json!({ "method": "POST" }),
            created_at: Utc::now(),
        };

        let csv = String::from_utf8(audit_logs_csv(&[entry]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_COLUMNS.join(",").as_str()));

        let row = lines.next().unwrap();
        assert!(row.starts_with("00000000-0000-0000-0000-000000000000,"));
        assert!(row.contains(",USER_LOGIN,,,,401,10.0.0.7,\"curl/8.0, test\","));
        assert!(row.ends_with(r#""{""method"":""POST""}""#));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        let csv = String::from_utf8(audit_logs_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.trim_end(), CSV_COLUMNS.join(","));
    }
}
