//! Veda Storage Library
//!
//! Object storage for archived media. The [`Storage`] trait has an S3
//! implementation (any S3-compatible service through `object_store`) and a
//! local filesystem implementation used in development and tests.
//!
//! # Object key format
//!
//! Uploaded files are stored under `users/{user_id}/{YYYY}/{MM}/{DD}/{8 hex}{.ext}`.
//! Keys never contain `..` or a leading `/`. Key generation lives in [`keys`]
//! so every backend sees the same layout.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
pub use keys::{
    asset_type_for_filename, content_type_for_filename, generate_object_key, sha256_hex,
    PRESIGNED_URL_EXPIRY,
};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Settings, S3Storage};
pub use traits::{ByteStream, ObjectAttributes, Storage, StorageError, StorageResult};
pub use veda_core::StorageBackend;
