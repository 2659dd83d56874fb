//! Database repositories
//!
//! Each repository owns a clone of the pool and maps one table.

pub mod asset;
pub mod audit_log;
pub mod transaction;
pub mod user;

pub use asset::AssetRepository;
pub use audit_log::AuditLogRepository;
pub use user::UserRepository;
