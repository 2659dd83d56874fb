//! Veda API Library
//!
//! HTTP handlers, middleware and application setup for the archive service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod utils;

pub mod auth;
pub mod error;
pub mod state;

pub use api_doc::{get_openapi_spec, ApiDoc};
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
