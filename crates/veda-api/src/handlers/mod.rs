pub mod assets;
pub mod audit_logs;
pub mod auth;
pub mod users;
