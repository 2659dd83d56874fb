//! Request audit trail.
//!
//! Every request outside the skip list produces one audit row describing who
//! did what, from where, and how it ended. Rows are written from a spawned
//! task so persistence never delays or fails the response. Each entry is also
//! emitted as a `tracing` event on the `audit` target.

use crate::auth::AuthenticatedUserId;
use crate::state::AppState;
use crate::utils::ip_extraction::request_client_ip;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use veda_core::{AuditAction, NewAuditLog};

const SKIP_PREFIXES: [&str; 9] = [
    "/static",
    "/health",
    "/favicon.ico",
    "/api/docs",
    "/api/redoc",
    "/api/openapi.json",
    "/docs",
    "/live",
    "/ready",
];

/// Paths whose request bodies are never recorded, even redacted.
const BODY_EXCLUDED_PATHS: [&str; 6] = [
    "/auth/token",
    "/auth/register",
    "/auth/otp",
    "/admin/login",
    "password",
    "/auth/login",
];

const REDACTED_FIELDS: [&str; 5] = ["password", "new_password", "current_password", "token", "otp"];
const REDACTED: &str = "***REDACTED***";

/// Request bodies larger than this are not captured.
const MAX_CAPTURED_BODY: usize = 64 * 1024;

pub fn should_skip(path: &str) -> bool {
    SKIP_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Map a request onto the audit action it represents.
pub fn determine_action(method: &Method, path: &str) -> AuditAction {
    if path.contains("/auth/token") || path.contains("/admin/login") || path.contains("/auth/otp/verify")
    {
        return AuditAction::UserLogin;
    }
    if path.contains("/auth/logout") {
        return AuditAction::UserLogout;
    }
    if path.contains("/auth/register") {
        return AuditAction::UserCreate;
    }
    if path.contains("/auth/reset-password") {
        return AuditAction::UserPasswordReset;
    }
    if path.contains("/auth/change-password") {
        return AuditAction::UserPasswordChange;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.contains(&"users") {
        return match *method {
            Method::POST => AuditAction::UserCreate,
            Method::PUT | Method::PATCH => AuditAction::UserUpdate,
            Method::DELETE => AuditAction::UserDelete,
            _ => AuditAction::Read,
        };
    }

    if let Some(pos) = segments.iter().position(|s| *s == "assets") {
        return match *method {
            Method::POST => AuditAction::AssetUpload,
            Method::PUT | Method::PATCH => AuditAction::AssetUpdate,
            Method::DELETE => AuditAction::AssetDelete,
            Method::GET => {
                let rest = &segments[pos + 1..];
                let targets_one = match rest {
                    [id] | [id, "download" | "preview"] => Uuid::parse_str(id).is_ok(),
                    _ => false,
                };
                if targets_one {
                    AuditAction::AssetDownload
                } else {
                    AuditAction::Read
                }
            }
            _ => AuditAction::Read,
        };
    }

    match *method {
        Method::POST => AuditAction::Create,
        Method::PUT | Method::PATCH => AuditAction::Update,
        Method::DELETE => AuditAction::Delete,
        _ => AuditAction::Read,
    }
}

/// `("user" | "asset", id)` when the path addresses the users or assets collection.
pub fn extract_target(path: &str) -> Option<(&'static str, Option<String>)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.iter().enumerate().find_map(|(i, segment)| {
        let target_type = match *segment {
            "users" => "user",
            "assets" => "asset",
            _ => return None,
        };
        Some((target_type, segments.get(i + 1).map(|id| id.to_string())))
    })
}

/// Replace credential fields at any depth.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn query_params(query: Option<&str>) -> Map<String, Value> {
    query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                percent_encoding::percent_decode_str(&s.replace('+', " "))
                    .decode_utf8_lossy()
                    .into_owned()
            };
            (decode(key), Value::String(decode(value)))
        })
        .collect()
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

fn declared_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Buffer a small JSON body so it can be recorded, then hand it back to the request.
async fn capture_body(request: Request, path: &str) -> (Request, Option<Value>) {
    let capturable = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH)
        && is_json(&request)
        && declared_length(&request).is_some_and(|len| len <= MAX_CAPTURED_BODY)
        && !BODY_EXCLUDED_PATHS.iter().any(|p| path.contains(p));
    if !capturable {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, MAX_CAPTURED_BODY).await {
        Ok(bytes) => {
            let recorded = match serde_json::from_slice::<Value>(&bytes) {
                Ok(mut value) => {
                    redact(&mut value);
                    value
                }
                Err(_) => json!({ "error": "Failed to parse JSON body" }),
            };
            (Request::from_parts(parts, Body::from(bytes)), Some(recorded))
        }
        Err(e) => {
            tracing::debug!(error = %e, "Could not buffer request body for audit");
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

/// Pull the `error` message out of a JSON error response, leaving the body intact.
async fn capture_error(response: Response) -> (Response, Option<String>) {
    let status = response.status();
    let fallback = status.canonical_reason().map(String::from);
    let (parts, body) = response.into_parts();
    match to_bytes(body, MAX_CAPTURED_BODY).await {
        Ok(bytes) => {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .or(fallback);
            (Response::from_parts(parts, Body::from(bytes)), message)
        }
        Err(_) => (Response::from_parts(parts, Body::empty()), fallback),
    }
}

pub async fn audit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if should_skip(&path) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let action = determine_action(&method, &path);
    let client_ip = request_client_ip(&request, state.config.trusted_proxy_count());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let request_id = veda_infra::get_request_id(&request);
    let query = query_params(request.uri().query());

    let (request, request_body) = capture_body(request, &path).await;

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    let status = response.status();
    let user_id = response
        .extensions()
        .get::<AuthenticatedUserId>()
        .map(|AuthenticatedUserId(id)| *id);

    let (mut response, error_message) = if status.is_client_error() || status.is_server_error() {
        capture_error(response).await
    } else {
        (response, None)
    };

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        response.headers_mut().insert("X-Process-Time", value);
    }

    let mut metadata = json!({
        "method": method.as_str(),
        "path": path,
        "query_params": query,
        "process_time_seconds": (elapsed * 10_000.0).round() / 10_000.0,
    });
    if let Some(request_id) = request_id {
        metadata["request_id"] = Value::String(request_id);
    }
    if let Some(body) = request_body {
        metadata["request_body"] = body;
    }

    let mut entry = NewAuditLog::new(action)
        .with_user(user_id)
        .with_status(status.as_u16())
        .with_client(Some(client_ip), user_agent)
        .with_metadata(metadata);
    if let Some((target_type, target_id)) = extract_target(&path) {
        entry = entry.with_target(target_type, target_id);
    }
    if let Some(message) = error_message {
        entry = entry.with_error(message);
    }

    record(&state, entry, status);
    response
}

fn record(state: &Arc<AppState>, entry: NewAuditLog, status: StatusCode) {
    tracing::info!(
        target: "audit",
        action = %entry.action,
        user_id = ?entry.user_id,
        target_type = ?entry.target_type,
        target_id = ?entry.target_id,
        status = status.as_u16(),
        ip = ?entry.ip_address,
        "Audit event"
    );

    let repository = state.db.audit_log_repository.clone();
    tokio::spawn(async move {
        if let Err(e) = repository.insert(entry).await {
            tracing::warn!(error = %e, "Failed to persist audit log entry");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_paths() {
        assert!(should_skip("/health"));
        assert!(should_skip("/docs/index.html"));
        assert!(should_skip("/api/openapi.json"));
        assert!(!should_skip("/api/v1/assets"));
    }

    #[test]
    fn test_auth_actions() {
        let post = Method::POST;
        assert_eq!(determine_action(&post, "/api/v1/auth/token"), AuditAction::UserLogin);
        assert_eq!(determine_action(&post, "/api/v1/admin/login"), AuditAction::UserLogin);
        assert_eq!(determine_action(&post, "/api/v1/auth/otp/verify"), AuditAction::UserLogin);
        assert_eq!(determine_action(&post, "/api/v1/auth/logout"), AuditAction::UserLogout);
        assert_eq!(determine_action(&post, "/api/v1/auth/register"), AuditAction::UserCreate);
        assert_eq!(
            determine_action(&post, "/api/v1/auth/reset-password"),
            AuditAction::UserPasswordReset
        );
        assert_eq!(
            determine_action(&post, "/api/v1/auth/change-password"),
            AuditAction::UserPasswordChange
        );
    }

    #[test]
    fn test_resource_actions() {
        let id = Uuid::new_v4();
        assert_eq!(determine_action(&Method::POST, "/api/v1/users"), AuditAction::UserCreate);
        assert_eq!(
            determine_action(&Method::PATCH, &format!("/api/v1/users/{}", id)),
            AuditAction::UserUpdate
        );
        assert_eq!(
            determine_action(&Method::DELETE, &format!("/api/v1/users/{}", id)),
            AuditAction::UserDelete
        );
        assert_eq!(determine_action(&Method::GET, "/api/v1/users"), AuditAction::Read);

        assert_eq!(determine_action(&Method::POST, "/api/v1/assets"), AuditAction::AssetUpload);
        assert_eq!(
            determine_action(&Method::GET, &format!("/api/v1/assets/{}/download", id)),
            AuditAction::AssetDownload
        );
        assert_eq!(
            determine_action(&Method::GET, &format!("/api/v1/assets/{}/preview", id)),
            AuditAction::AssetDownload
        );
        assert_eq!(
            determine_action(&Method::GET, &format!("/api/v1/assets/{}", id)),
            AuditAction::AssetDownload
        );
        assert_eq!(
            determine_action(&Method::GET, "/api/v1/assets/export"),
            AuditAction::Read
        );
        assert_eq!(determine_action(&Method::GET, "/api/v1/assets"), AuditAction::Read);
        assert_eq!(
            determine_action(&Method::DELETE, &format!("/api/v1/assets/{}", id)),
            AuditAction::AssetDelete
        );
    }

    #[test]
    fn test_fallback_by_method() {
        assert_eq!(determine_action(&Method::GET, "/api/v1/auth/me"), AuditAction::Read);
        assert_eq!(determine_action(&Method::POST, "/api/v1/other"), AuditAction::Create);
        assert_eq!(determine_action(&Method::PUT, "/api/v1/other"), AuditAction::Update);
        assert_eq!(determine_action(&Method::DELETE, "/api/v1/other"), AuditAction::Delete);
    }

    #[test]
    fn test_extract_target() {
        assert_eq!(
            extract_target("/api/v1/assets/abc/download"),
            Some(("asset", Some("abc".to_string())))
        );
        assert_eq!(extract_target("/api/v1/users"), Some(("user", None)));
        assert_eq!(extract_target("/api/v1/audit-logs"), None);
    }

    #[test]
    fn test_redaction_is_recursive() {
        let mut body = json!({
            "email": "a@example.org",
            "password": "Secr3t!!",
            "nested": { "token": "abc", "keep": 1 },
            "list": [{ "otp": "123456" }]
        });
        redact(&mut body);
        assert_eq!(body["email"], "a@example.org");
        assert_eq!(body["password"], REDACTED);
        assert_eq!(body["nested"]["token"], REDACTED);
        assert_eq!(body["nested"]["keep"], 1);
        assert_eq!(body["list"][0]["otp"], REDACTED);
    }

    #[test]
    fn test_query_params() {
        let params = query_params(Some("q=bhajan+kirtan&type=audio&flag"));
        assert_eq!(params["q"], "bhajan kirtan");
        assert_eq!(params["type"], "audio");
        assert_eq!(params["flag"], "");
        assert!(query_params(None).is_empty());
    }
}
