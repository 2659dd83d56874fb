//! API constants
//!
//! Every archive route except health checks and docs lives under [`API_PREFIX`].

/// Versioned prefix for archive routes
pub const API_PREFIX: &str = "/api/v1";

/// Path serving the OpenAPI document
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Name of the session cookie set on login
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Failed logins allowed per client IP inside [`AUTH_FAILURE_WINDOW_SECS`]
pub const AUTH_FAILURE_LIMIT: u32 = 10;
pub const AUTH_FAILURE_WINDOW_SECS: u64 = 900;
