use crate::auth::cookie::extract_token;
use crate::auth::jwt::{JwtService, TokenType};
use crate::auth::models::{AuthenticatedUserId, CurrentUser};
use crate::error::HttpAppError;
use crate::utils::ip_extraction::request_client_ip;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use veda_core::AppError;
use veda_db::UserRepository;

pub const INVALID_CREDENTIALS: &str = "Could not validate credentials";
pub const INACTIVE_USER: &str = "Inactive user";

/// Per-IP counter of failed authentication attempts inside a fixed window.
#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Count a failure. Returns true once the IP has reached the limit.
    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let (count, reset_at) = guard
            .entry(ip.to_string())
            .or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(&(count, reset_at)) = guard.get(ip) else {
            return false;
        };
        if Instant::now() >= reset_at {
            guard.remove(ip);
            return false;
        }
        count >= self.max_failures
    }

    /// Forget failures for an IP after a successful login.
    pub async fn reset(&self, ip: &str) {
        self.inner.lock().await.remove(ip);
    }

    /// Error returned while an IP is blocked.
    pub fn blocked_error() -> AppError {
        AppError::TooManyRequests(
            "Too many failed authentication attempts. Please try again later.".to_string(),
        )
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub user_repository: UserRepository,
    pub auth_failure_limiter: Option<Arc<AuthFailureLimiter>>,
    pub trusted_proxy_count: usize,
}

impl AuthState {
    async fn reject(&self, client_ip: &str, reason: &str) -> Response {
        tracing::debug!(client_ip = %client_ip, reason = reason, "Authentication failed");
        if let Some(ref limiter) = self.auth_failure_limiter {
            if limiter.record_failure(client_ip).await {
                tracing::warn!(client_ip = %client_ip, "Authentication failure limit reached");
            }
        }
        HttpAppError(AppError::Unauthorized(INVALID_CREDENTIALS.to_string())).into_response()
    }
}

/// Resolve the access token to an active user and attach it to the request.
///
/// The token comes from `Authorization: Bearer` or the `access_token` cookie.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_ip = request_client_ip(&request, auth_state.trusted_proxy_count);

    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.is_blocked(&client_ip).await {
            return HttpAppError(AuthFailureLimiter::blocked_error()).into_response();
        }
    }

    // Only presented-but-bad tokens count towards the failure limit.
    let Some(token) = extract_token(request.headers()) else {
        return HttpAppError(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))
            .into_response();
    };

    let claims = match auth_state.jwt.validate(&token, TokenType::Access) {
        Ok(claims) => claims,
        Err(e) => return auth_state.reject(&client_ip, &e.to_string()).await,
    };

    let user = match auth_state.user_repository.get_by_id(claims.uid).await {
        Ok(Some(user)) => user,
        Ok(None) => return auth_state.reject(&client_ip, "unknown user").await,
        Err(e) => return HttpAppError(e).into_response(),
    };

    if !user.is_active() {
        return HttpAppError(AppError::Forbidden(INACTIVE_USER.to_string())).into_response();
    }

    let user_id = user.id;
    request.extensions_mut().insert(CurrentUser(user));

    let mut response = next.run(request).await;
    response
        .extensions_mut()
        .insert(AuthenticatedUserId(user_id));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_blocks_after_max_failures() {
        let limiter = AuthFailureLimiter::new(3, 900);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.1").await);
        assert!(limiter.record_failure("10.0.0.1").await);
        assert!(limiter.is_blocked("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.2").await);

        limiter.reset("10.0.0.1").await;
        assert!(!limiter.is_blocked("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_limiter_window_expires() {
        let limiter = AuthFailureLimiter::new(1, 0);
        assert!(limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.1").await);
    }
}
