use crate::traits::{ChunkStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, Result as ObjectResult};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// S3 storage implementation
///
/// Uploads go through a buffered multipart writer, so memory use is bounded
/// by the part size rather than the object size.
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<AmazonS3>,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// * `endpoint_url` - custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store: Arc::new(store),
            bucket,
        })
    }
}

/// Multipart writer that is aborted if dropped before `finish` or `abort`.
///
/// A cancelled upload future drops this guard mid-copy; the abort then runs
/// on a spawned task. Uploads dropped while the multipart id is still being
/// created cannot be aborted here and are left to the bucket lifecycle rule.
struct PendingUpload {
    writer: Option<BufWriter>,
    bucket: String,
    key: String,
}

impl PendingUpload {
    fn new(writer: BufWriter, bucket: &str, key: &str) -> Self {
        PendingUpload {
            writer: Some(writer),
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    async fn copy_from(
        &mut self,
        reader: &mut Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> std::io::Result<u64> {
        match self.writer.as_mut() {
            Some(writer) => tokio::io::copy(reader, writer).await,
            None => Err(std::io::Error::other("upload already closed")),
        }
    }

    /// Complete the upload. A failed completion is not aborted: the writer
    /// is already shut down and the key is removed by the caller's cleanup.
    async fn finish(mut self) -> std::io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.shutdown().await,
            None => Err(std::io::Error::other("upload already closed")),
        }
    }

    async fn abort(mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                tracing::warn!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %self.key,
                    "Failed to abort S3 multipart upload"
                );
            }
        }
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, "No runtime to abort dropped S3 upload");
            return;
        };

        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            match writer.abort().await {
                Ok(()) => tracing::info!(
                    bucket = %bucket,
                    key = %key,
                    "Aborted cancelled S3 multipart upload"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    "Failed to abort cancelled S3 multipart upload"
                ),
            }
        });
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        content_length: u64,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());
        let mut upload = PendingUpload::new(
            BufWriter::new(self.store.clone(), location),
            &self.bucket,
            storage_key,
        );

        let copied = match upload.copy_from(&mut reader).await {
            Ok(n) => upload.finish().await.map(|_| n),
            Err(e) => {
                upload.abort().await;
                Err(e)
            }
        };

        let bytes_copied = match copied {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    declared_bytes = content_length,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream upload failed"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes_copied,
            declared_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stream upload successful"
        );

        Ok(bytes_copied)
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ChunkStream> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bucket = self.bucket.clone();
        let key = storage_key.to_string();

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

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size),
            Err(ObjectStoreError::NotFound { .. }) => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
