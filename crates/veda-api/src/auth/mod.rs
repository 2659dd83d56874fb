//! Authentication: JWT sessions, the auth middleware and the current-user extractor.

pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use jwt::{Claims, JwtService, TokenType};
pub use middleware::{auth_middleware, AuthFailureLimiter, AuthState};
pub use models::{
    AuthenticatedUserId, CsrfTokenResponse, CurrentUser, MessageResponse, TokenResponse,
};
