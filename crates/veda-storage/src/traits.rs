//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use veda_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Streamed object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("File not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Attributes stored with an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub content_type: String,
    /// Account that uploaded the object
    pub uploaded_by: Option<String>,
    pub checksum_sha256: Option<String>,
}

impl ObjectAttributes {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }
}

/// Object storage used for archived media.
///
/// Keys are produced by [`crate::keys::generate_object_key`]; backends store
/// bytes under the key as given.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        attributes: &ObjectAttributes,
    ) -> StorageResult<()>;

    /// Stream an object's bytes.
    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Time-limited GET URL for a private object.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Unauthenticated URL for a public object.
    fn public_url(&self, key: &str) -> String;

    fn backend_type(&self) -> StorageBackend;
}
