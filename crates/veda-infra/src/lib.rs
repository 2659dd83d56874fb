//! Veda Infrastructure Library
//!
//! Shared HTTP middleware (request id, security headers, CSRF) and tracing setup.

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "middleware")]
pub use middleware::{
    csrf_cookie, csrf_middleware, generate_csrf_token, get_request_id, request_id_middleware,
    security_headers_middleware, CsrfConfig, RequestId, CSRF_COOKIE,
    CSRF_HEADER,
};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, LogFormat};
