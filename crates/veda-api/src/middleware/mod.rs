//! Archive-specific HTTP middleware. Request id and security headers come from `veda-infra`.

pub mod audit;
pub mod rate_limit;

pub use audit::audit_middleware;
pub use rate_limit::{rate_limit_middleware, HttpRateLimiter};
