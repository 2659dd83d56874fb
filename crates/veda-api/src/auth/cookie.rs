//! Session cookie handling.
//!
//! The cookie holds the bare access token. Values written with a `Bearer `
//! prefix (optionally quoted) are accepted on read.

use axum::http::{header, HeaderMap, HeaderValue};
use veda_core::AppError;

use crate::constants::ACCESS_TOKEN_COOKIE;

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("access_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// New CSRF token with the `Set-Cookie` value that pairs it with the session.
pub fn new_csrf_cookie(
    secret: &str,
    max_age_secs: i64,
    secure: bool,
) -> Result<(String, HeaderValue), AppError> {
    let failed = || AppError::Internal("Failed to generate CSRF token".to_string());
    let token = veda_infra::generate_csrf_token(secret, chrono::Utc::now().timestamp())
        .ok_or_else(failed)?;
    let cookie = veda_infra::csrf_cookie(&token, max_age_secs, secure).ok_or_else(failed)?;
    Ok((token, cookie))
}

/// Access token from the `access_token` cookie, if present.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Bearer token from `Authorization`, falling back to the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty());

    from_header.or_else(|| token_from_cookies(headers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc.def.ghi", 3600, true).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("access_token=abc.def.ghi;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));

        let insecure = session_cookie("t", 60, false).unwrap();
        assert!(!insecure.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_new_csrf_cookie() {
        let (token, cookie) = new_csrf_cookie(&"s".repeat(32), 600, false).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("csrf_token={};", token)));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=600"));
    }

    #[test]
    fn test_extract_token_prefers_authorization_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_cookie_with_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=\"Bearer tok\"; lang=en"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn test_missing_or_malformed() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        assert_eq!(extract_token(&headers), None);
    }
}
