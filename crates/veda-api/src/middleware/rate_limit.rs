use crate::utils::ip_extraction::request_client_ip;
use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_SHARDS: usize = 16;
const MAX_BUCKETS_PER_SHARD: usize = 10_000;

/// Fixed one-minute window for one client key.
#[derive(Debug, Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            reset_at: now + WINDOW,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        now >= self.reset_at + WINDOW
    }

    /// Count one request. `Ok(remaining)` when allowed, `Err(reset_in)` otherwise.
    fn hit(&mut self, limit: u32, now: Instant) -> Result<u32, Duration> {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + WINDOW;
        }

        if self.count < limit {
            self.count += 1;
            Ok(limit - self.count)
        } else {
            Err(self.reset_at.saturating_duration_since(now))
        }
    }
}

/// In-memory per-client request limiter.
///
/// Keys are spread over independently locked shards so concurrent requests from
/// different clients rarely contend on the same mutex.
#[derive(Clone)]
pub struct HttpRateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, RateLimitBucket>>>>,
    limit_per_minute: u32,
    trusted_proxy_count: usize,
}

impl HttpRateLimiter {
    pub fn new(limit_per_minute: u32, trusted_proxy_count: usize) -> Self {
        Self::with_shards(limit_per_minute, trusted_proxy_count, DEFAULT_SHARDS)
    }

    pub fn with_shards(limit_per_minute: u32, trusted_proxy_count: usize, shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            limit_per_minute,
            trusted_proxy_count,
        }
    }

    pub fn limit_per_minute(&self) -> u32 {
        self.limit_per_minute
    }

    fn shard(&self, key: &str) -> &Arc<Mutex<HashMap<String, RateLimitBucket>>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Drop buckets whose window ended more than a window ago.
    pub async fn cleanup_expired_buckets(&self) {
        let now = Instant::now();
        let mut cleaned = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| !bucket.is_stale(now));
            cleaned += before - buckets.len();
        }
        if cleaned > 0 {
            tracing::debug!(buckets_cleaned = cleaned, "Cleaned up expired rate limit buckets");
        }
    }

    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, Duration> {
        let now = Instant::now();
        let mut buckets = self.shard(key).lock().await;

        if buckets.len() >= MAX_BUCKETS_PER_SHARD && !buckets.contains_key(key) {
            buckets.retain(|_, bucket| !bucket.is_stale(now));
            if buckets.len() >= MAX_BUCKETS_PER_SHARD {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    buckets.remove(&oldest);
                }
            }
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket::new(now))
            .hit(self.limit_per_minute, now)
    }
}

fn set_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

/// Per-IP request limiting.
///
/// Adds `X-RateLimit-Limit` and `X-RateLimit-Remaining` to every response, and
/// answers 429 with `Retry-After` once the minute's budget is spent.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request_client_ip(&request, rate_limiter.trusted_proxy_count);
    let key = format!("ip:{}", ip);
    let limit = rate_limiter.limit_per_minute;

    match rate_limiter.check_rate_limit(&key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            set_header(&mut response, "X-RateLimit-Limit", limit);
            set_header(&mut response, "X-RateLimit-Remaining", remaining);
            response
        }
        Err(reset_in) => {
            tracing::warn!(
                client = %key,
                path = %request.uri().path(),
                limit = limit,
                "Rate limit exceeded"
            );

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "error": "Too many requests. Please slow down."
                })),
            )
                .into_response();
            set_header(&mut response, "X-RateLimit-Limit", limit);
            set_header(&mut response, "X-RateLimit-Remaining", 0);
            set_header(&mut response, "Retry-After", reset_in.as_secs().max(1));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_allows_up_to_limit_then_rejects() {
        let limiter = HttpRateLimiter::with_shards(3, 0, 4);
        assert_eq!(limiter.check_rate_limit("ip:1.2.3.4").await, Ok(2));
        assert_eq!(limiter.check_rate_limit("ip:1.2.3.4").await, Ok(1));
        assert_eq!(limiter.check_rate_limit("ip:1.2.3.4").await, Ok(0));
        let reset_in = limiter.check_rate_limit("ip:1.2.3.4").await.unwrap_err();
        assert!(reset_in <= WINDOW);

        // Other clients have their own budget.
        assert_eq!(limiter.check_rate_limit("ip:5.6.7.8").await, Ok(2));
    }

    #[test]
    fn test_bucket_resets_after_window() {
        let start = Instant::now();
        let mut bucket = RateLimitBucket::new(start);
        assert_eq!(bucket.hit(1, start), Ok(0));
        assert!(bucket.hit(1, start).is_err());
        assert_eq!(bucket.hit(1, start + WINDOW), Ok(0));
        assert!(!bucket.is_stale(start + WINDOW));
        assert!(bucket.is_stale(start + WINDOW * 3));
    }

    #[tokio::test]
    async fn test_middleware_sets_headers_and_429() {
        let limiter = Arc::new(HttpRateLimiter::new(1, 0));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));

        let request = || {
            Request::builder()
                .uri("/")
                .header("x-real-ip", "198.51.100.1")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()["X-RateLimit-Limit"], "1");
        assert_eq!(first.headers()["X-RateLimit-Remaining"], "0");

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key("Retry-After"));
    }
}
