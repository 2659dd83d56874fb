//! Veda database layer
//!
//! Postgres repositories for accounts, archived assets and the audit trail.

pub mod db;

pub use db::transaction::with_transaction;
pub use db::{AssetRepository, AuditLogRepository, UserRepository};
