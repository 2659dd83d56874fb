//! Veda Core Library
//!
//! Domain models, error types, configuration and validation shared by the
//! archive API, the database layer and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod otp;
pub mod password;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{ArchiveConfig, Config, ContentTypeGroup};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    Asset, AssetFilter, AssetResponse, AssetStatus, AssetType, AuditAction, AuditLog,
    AuditLogFilter, NewAsset, NewAuditLog, NewUser, UpdateAsset, User, UserFilter, UserResponse,
    UserRole, UserStatus,
};
pub use storage_types::StorageBackend;
