//! Shared HTTP middleware

pub mod csrf;
pub mod request_id;
pub mod security_headers;

pub use csrf::{
    csrf_cookie, csrf_middleware, generate_csrf_token, CsrfConfig,
    CSRF_COOKIE, CSRF_HEADER,
};
pub use request_id::{get_request_id, request_id_middleware, RequestId};
pub use security_headers::security_headers_middleware;
