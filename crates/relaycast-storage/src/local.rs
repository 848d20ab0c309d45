use crate::traits::{ChunkStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncRead;

const PARTIAL_SUFFIX: &str = ".partial";

/// Local filesystem storage implementation
///
/// Uploads are written to a temporary `.partial` file next to the key and
/// renamed into place once complete, so a key never exposes a half-written
/// object. The temporary file is removed when the upload fails or its future
/// is dropped.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path` (created if missing).
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert storage key to filesystem path, rejecting keys that escape the base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                storage_key
            )));
        }

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<PathBuf> {
        let parent = path.parent().unwrap_or(&self.base_path).to_path_buf();
        fs::create_dir_all(&parent).await?;
        Ok(parent)
    }
}

/// A uniquely named `.partial` file in `dir`, deleted when dropped.
fn partial_in(dir: &Path) -> std::io::Result<tempfile::TempPath> {
    let file = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        content_length: u64,
        mut reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let dir = self.ensure_parent_dir(&path).await?;
        let partial = partial_in(&dir).map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;

        let result: StorageResult<u64> = async {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&partial)
                .await
                .map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to open file {}: {}",
                        partial.display(),
                        e
                    ))
                })?;

            let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    partial.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to sync file {}: {}",
                    partial.display(),
                    e
                ))
            })?;

            Ok(bytes_copied)
        }
        .await;

        let result = result.and_then(|bytes_copied| {
            partial.persist(&path).map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to move {} into place: {}",
                    e.path.display(),
                    e.error
                ))
            })?;
            Ok(bytes_copied)
        });

        match result {
            Ok(bytes_copied) => {
                tracing::info!(
                    path = %path.display(),
                    key = %storage_key,
                    size_bytes = bytes_copied,
                    declared_bytes = content_length,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream upload successful"
                );
                Ok(bytes_copied)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream upload failed"
                );
                Err(e)
            }
        }
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ChunkStream> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let key = storage_key.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let removed = remove_if_exists(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            existed = removed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
