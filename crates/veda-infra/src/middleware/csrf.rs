//! CSRF protection for cookie sessions
//!
//! Double-submit cookie pattern: a state-changing request that authenticates
//! with the session cookie must send the `X-CSRF-Token` header with the same
//! value as the `csrf_token` cookie, and that value must carry a valid
//! signature. Requests with an `Authorization` header are not cookie
//! authenticated and pass through.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the CSRF token
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header the client echoes the token in
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_FAILED: &str = "CSRF token validation failed";

/// Settings for [`csrf_middleware`].
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub secret: String,
    /// Name of the cookie that carries the session; only requests sending it are checked
    pub session_cookie: &'static str,
    /// Token lifetime in seconds
    pub max_age_secs: i64,
}

fn sign(secret: &str, message: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Generate a CSRF token
/// Token format: `<hmac>.<timestamp>.<nonce>`
pub fn generate_csrf_token(secret: &str, now: i64) -> Option<String> {
    let message = format!("{}.{}", now, Uuid::new_v4().simple());
    let hmac = sign(secret, &message)?;
    Some(format!("{}.{}", hmac, message))
}

/// Check the signature and age of a token.
pub fn verify_csrf_token(token: &str, secret: &str, now: i64, max_age_secs: i64) -> bool {
    let mut parts = token.splitn(3, '.');
    let (Some(hmac_part), Some(timestamp), Some(nonce)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Ok(issued_at) = timestamp.parse::<i64>() else {
        return false;
    };
    if issued_at > now || now - issued_at > max_age_secs {
        tracing::debug!("CSRF token expired");
        return false;
    }

    let Some(expected) = sign(secret, &format!("{}.{}", timestamp, nonce)) else {
        return false;
    };
    expected.as_bytes().ct_eq(hmac_part.as_bytes()).into()
}

/// Value of cookie `name`, if the request sends it.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a CSRF token.
pub fn csrf_cookie(token: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        CSRF_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

fn needs_check(request: &Request, session_cookie: &str) -> bool {
    if matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    ) {
        return false;
    }
    let headers = request.headers();
    !headers.contains_key(header::AUTHORIZATION)
        && cookie_value(headers, session_cookie).is_some()
}

/// Reject cookie-authenticated mutations without a matching CSRF token.
pub async fn csrf_middleware(
    State(config): State<Arc<CsrfConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if !needs_check(&request, config.session_cookie) {
        return next.run(request).await;
    }

    let headers = request.headers();
    let header_token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    let cookie_token = cookie_value(headers, CSRF_COOKIE);

    let is_valid = match (header_token, cookie_token) {
        (Some(header_token), Some(cookie_token)) => {
            bool::from(header_token.as_bytes().ct_eq(cookie_token.as_bytes()))
                && verify_csrf_token(
                    header_token,
                    &config.secret,
                    chrono::Utc::now().timestamp(),
                    config.max_age_secs,
                )
        }
        _ => false,
    };

    if !is_valid {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected cookie-authenticated request without a valid CSRF token"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": CSRF_FAILED,
                "code": "CSRF_VALIDATION_FAILED",
                "recoverable": true,
                "suggested_action": "Send the X-CSRF-Token header matching the csrf_token cookie"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::post, Router};
    use tower::ServiceExt;

    const SECRET: &str = "csrf-test-secret-with-enough-length";

    #[test]
    fn test_generate_csrf_token() {
        let token = generate_csrf_token(SECRET, 1_700_000_000).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 64);
        assert_eq!(parts[1], "1700000000");
    }

    #[test]
    fn test_verify_csrf_token() {
        let now = 1_700_000_000;
        let token = generate_csrf_token(SECRET, now).unwrap();

        assert!(verify_csrf_token(&token, SECRET, now + 10, 3600));
        assert!(!verify_csrf_token(&token, "another-secret", now, 3600));
        assert!(!verify_csrf_token(&token, SECRET, now + 3601, 3600));
        assert!(!verify_csrf_token(&token, SECRET, now - 5, 3600));
        assert!(!verify_csrf_token("abc.123", SECRET, now, 3600));
        assert!(!verify_csrf_token("invalid", SECRET, now, 3600));

        let tampered = token.replacen("1700000000", "1700000001", 1);
        assert!(!verify_csrf_token(&tampered, SECRET, now + 10, 3600));
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=abc; csrf_token=t.1.n"),
        );
        assert_eq!(cookie_value(&headers, CSRF_COOKIE).as_deref(), Some("t.1.n"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    fn app() -> Router {
        let config = Arc::new(CsrfConfig {
            secret: SECRET.to_string(),
            session_cookie: "access_token",
            max_age_secs: 3600,
        });
        Router::new()
            .route("/things", post(|| async { "ok" }).get(|| async { "ok" }))
            .layer(from_fn_with_state(config, csrf_middleware))
    }

    async fn status(request: axum::http::Request<Body>) -> StatusCode {
        app().oneshot(request).await.unwrap().status()
    }

    fn post_with(cookie: Option<String>, csrf_header: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/things");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = csrf_header {
            builder = builder.header(CSRF_HEADER, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_cookie_session_requires_matching_token() {
        let token = generate_csrf_token(SECRET, chrono::Utc::now().timestamp()).unwrap();

        let missing = post_with(Some("access_token=session".to_string()), None);
        assert_eq!(status(missing).await, StatusCode::FORBIDDEN);

        let header_only = post_with(Some("access_token=session".to_string()), Some(&token));
        assert_eq!(status(header_only).await, StatusCode::FORBIDDEN);

        let matching = post_with(
            Some(format!("access_token=session; csrf_token={}", token)),
            Some(&token),
        );
        assert_eq!(status(matching).await, StatusCode::OK);

        let other = generate_csrf_token(SECRET, chrono::Utc::now().timestamp()).unwrap();
        let mismatched = post_with(
            Some(format!("access_token=session; csrf_token={}", token)),
            Some(&other),
        );
        assert_eq!(status(mismatched).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bearer_and_safe_requests_pass() {
        let bearer = axum::http::Request::builder()
            .method("POST")
            .uri("/things")
            .header(header::AUTHORIZATION, "Bearer abc")
            .header(header::COOKIE, "access_token=session")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(bearer).await, StatusCode::OK);

        let no_session = post_with(None, None);
        assert_eq!(status(no_session).await, StatusCode::OK);

        let get = axum::http::Request::builder()
            .uri("/things")
            .header(header::COOKIE, "access_token=session")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status(get).await, StatusCode::OK);
    }
}
