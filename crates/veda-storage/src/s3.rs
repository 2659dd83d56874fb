use crate::traits::{ByteStream, ObjectAttributes, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::time::Duration;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, R2)
    pub endpoint_url: Option<String>,
    /// Base URL for public objects, e.g. a CDN in front of the bucket
    pub public_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    public_url: Option<String>,
}

impl S3Storage {
    pub fn new(settings: S3Settings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(settings.region.clone())
            .with_bucket_name(settings.bucket.clone());

        if let Some(ref endpoint) = settings.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            builder = builder
                .with_access_key_id(key_id.clone())
                .with_secret_access_key(secret.clone());
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: settings.bucket,
            region: settings.region,
            endpoint_url: settings.endpoint_url,
            public_url: settings.public_url,
        })
    }

    /// Public URL for an object.
    ///
    /// Prefers the configured public base URL, then path-style addressing on
    /// a custom endpoint, then the AWS virtual-hosted form.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref public) = self.public_url {
            return format!("{}/{}", public.trim_end_matches('/'), key);
        }
        match self.endpoint_url {
            Some(ref endpoint) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

/// Object headers for a put: `Content-Type` plus `uploaded-by` and
/// `checksum` user metadata when known.
fn put_options(attributes: &ObjectAttributes) -> PutOptions {
    let mut attrs = Attributes::new();
    attrs.insert(Attribute::ContentType, attributes.content_type.clone().into());
    if let Some(ref uploaded_by) = attributes.uploaded_by {
        attrs.insert(
            Attribute::Metadata("uploaded-by".into()),
            uploaded_by.clone().into(),
        );
    }
    if let Some(ref checksum) = attributes.checksum_sha256 {
        attrs.insert(Attribute::Metadata("checksum".into()), checksum.clone().into());
    }

    PutOptions {
        attributes: attrs,
        ..Default::default()
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        attributes: &ObjectAttributes,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), put_options(attributes))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();
        let key = key.to_string();

        let stream = result.into_stream().map(move |res| {
            res.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let location = Path::from(key.to_string());
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Presigned URL generation failed");
                StorageError::BackendError(e.to_string())
            })?
            .to_string();

        Ok(url)
    }

    fn public_url(&self, key: &str) -> String {
        self.generate_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
