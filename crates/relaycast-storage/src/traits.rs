//! Storage abstraction trait

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

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

/// Chunks of a stored object
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Backing store for staged objects.
///
/// Implementations must treat a delete of a missing key as success.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the reader to `storage_key` until EOF and return the number of
    /// bytes written. `content_length` is the size declared by the source.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: u64,
        reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64>;

    /// Stream an object's bytes. Fails with `NotFound` when the key is absent.
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ChunkStream>;

    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an existing object.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    fn backend_type(&self) -> StorageBackend;
}
