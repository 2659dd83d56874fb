use crate::traits::{ByteStream, ObjectAttributes, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage, used in development and tests.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create the storage root if missing.
    ///
    /// `base_url` is where the files are served from, e.g. `http://localhost:8000/media`.
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Map a key to a path under the root. Only plain relative segments are
    /// accepted, so a key can never resolve outside `base_path`.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(self.base_path.join(relative))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    /// Files carry no attributes; the content type is served from the asset row.
    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        _attributes: &ObjectAttributes,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let key = key.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
            chunk.map_err(|e| {
                tracing::error!(error = %e, key = %key, "Local storage stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Local files have no signing; the served URL is returned as is.
    async fn presigned_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.generate_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:8000/media/".to_string())
            .await
            .unwrap()
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_upload_and_stream_back() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "users/abc/2024/01/02/deadbeef.mp3";

        storage
            .upload(
                key,
                Bytes::from_static(b"kirtan"),
                &ObjectAttributes::new("audio/mpeg"),
            )
            .await
            .unwrap();

        assert!(storage.exists(key).await.unwrap());
        let stream = storage.download_stream(key).await.unwrap();
        assert_eq!(read_all(stream).await, b"kirtan");
        assert_eq!(
            storage.public_url(key),
            "http://localhost:8000/media/users/abc/2024/01/02/deadbeef.mp3"
        );
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(matches!(
            storage.download_stream("../../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.delete("users/../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.exists("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("nonexistent/file.txt").await.is_ok());
        assert!(!storage.exists("nonexistent/file.txt").await.unwrap());
        assert!(matches!(
            storage.download_stream("nonexistent/file.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload(
                "a/b.pdf",
                Bytes::from_static(b"%PDF"),
                &ObjectAttributes::new("application/pdf"),
            )
            .await
            .unwrap();
        storage.delete("a/b.pdf").await.unwrap();
        assert!(!storage.exists("a/b.pdf").await.unwrap());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
