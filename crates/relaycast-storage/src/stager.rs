//! Staging operations used by a publish run.
//!
//! A run allocates a [`StagedKey`] before any byte is written, so even a
//! failed `stage` leaves the run holding the key it must clean up.

use crate::artifact::LocalArtifact;
use crate::keys::StagedKey;
use crate::traits::{Storage, StorageError};
use async_trait::async_trait;
use futures::StreamExt;
use relaycast_core::ByteStream;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

const STAGING_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StagerError {
    #[error("Failed to write staged object {key}: {message}")]
    Write { key: String, message: String },

    #[error("Staged object {key} received {actual} bytes, expected {expected}")]
    LengthMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Staged object not found: {0}")]
    NotFound(String),

    #[error("Failed to read staged object {key}: {message}")]
    Read { key: String, message: String },

    #[error("Failed to delete staged object {key}: {message}")]
    Delete { key: String, message: String },
}

impl StagerError {
    /// True for failures that happened while writing the staged object.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StagerError::Write { .. } | StagerError::LengthMismatch { .. }
        )
    }
}

/// Durable intermediate storage for one run's source bytes.
#[async_trait]
pub trait ObjectStager: Send + Sync {
    /// A fresh key, unique across runs. Nothing is written yet.
    fn allocate_key(&self) -> StagedKey;

    /// Write exactly `length` bytes from `stream` under `key`.
    async fn stage(&self, key: &StagedKey, stream: ByteStream, length: u64)
        -> Result<(), StagerError>;

    /// Download the staged bytes into a run-owned local artifact.
    async fn materialize(&self, key: &StagedKey) -> Result<LocalArtifact, StagerError>;

    /// Remove the staged object. Deleting a missing key succeeds.
    async fn delete(&self, key: &StagedKey) -> Result<(), StagerError>;
}

/// [`ObjectStager`] backed by a [`Storage`] implementation.
pub struct StorageStager {
    storage: Arc<dyn Storage>,
    prefix: String,
    artifact_dir: Option<PathBuf>,
}

impl StorageStager {
    pub fn new(storage: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        StorageStager {
            storage,
            prefix: prefix.into(),
            artifact_dir: None,
        }
    }

    /// Place local artifacts under `dir` instead of the system temp dir.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    fn new_artifact_path(&self) -> io::Result<tempfile::TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("relaycast-").suffix(".video");
        let file = match &self.artifact_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}

/// Pass chunks through, failing as soon as more than `limit` bytes arrive.
fn bounded(stream: ByteStream, limit: u64) -> ByteStream {
    let mut seen: u64 = 0;
    Box::pin(stream.map(move |chunk| {
        let chunk = chunk?;
        seen += chunk.len() as u64;
        if seen > limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("source sent more than the declared {} bytes", limit),
            ));
        }
        Ok(chunk)
    }))
}

#[async_trait]
impl ObjectStager for StorageStager {
    fn allocate_key(&self) -> StagedKey {
        StagedKey::generate(&self.prefix)
    }

    async fn stage(
        &self,
        key: &StagedKey,
        stream: ByteStream,
        length: u64,
    ) -> Result<(), StagerError> {
        let start = std::time::Instant::now();
        let reader = StreamReader::new(bounded(stream, length));

        let written = self
            .storage
            .upload_stream(key.as_str(), STAGING_CONTENT_TYPE, length, Box::pin(reader))
            .await
            .map_err(|e| StagerError::Write {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if written != length {
            return Err(StagerError::LengthMismatch {
                key: key.to_string(),
                expected: length,
                actual: written,
            });
        }

        tracing::debug!(
            key = %key,
            backend = %self.storage.backend_type(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Staged source object"
        );

        Ok(())
    }

    async fn materialize(&self, key: &StagedKey) -> Result<LocalArtifact, StagerError> {
        let start = std::time::Instant::now();
        let read_err = |message: String| StagerError::Read {
            key: key.to_string(),
            message,
        };

        let mut stream = self
            .storage
            .download_stream(key.as_str())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(k) => StagerError::NotFound(k),
                other => read_err(other.to_string()),
            })?;

        // Dropping `path` on any early return below removes the partial file.
        let path = self
            .new_artifact_path()
            .map_err(|e| read_err(format!("failed to create local artifact: {}", e)))?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| read_err(format!("failed to open local artifact: {}", e)))?;

        let mut size: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| read_err(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| read_err(format!("failed to write local artifact: {}", e)))?;
            size += chunk.len() as u64;
        }
        file.sync_all()
            .await
            .map_err(|e| read_err(format!("failed to sync local artifact: {}", e)))?;
        drop(file);

        tracing::debug!(
            key = %key,
            path = %path.display(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Materialized staged object"
        );

        Ok(LocalArtifact::new(path, size))
    }

    async fn delete(&self, key: &StagedKey) -> Result<(), StagerError> {
        match self.storage.delete(key.as_str()).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(StagerError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::LocalStorage;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<io::Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn stager(root: &std::path::Path) -> (StorageStager, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> =
            Arc::new(LocalStorage::new(root.join("objects")).await.unwrap());
        let artifacts = root.join("artifacts");
        std::fs::create_dir_all(&artifacts).unwrap();
        (
            StorageStager::new(storage.clone(), "staging").with_artifact_dir(artifacts),
            storage,
        )
    }

    #[tokio::test]
    async fn test_stage_materialize_delete() {
        let dir = tempdir().unwrap();
        let (stager, storage) = stager(dir.path()).await;

        let key = stager.allocate_key();
        assert!(key.as_str().starts_with("staging/"));

        stager
            .stage(&key, chunks(&[b"hello ", b"world"]), 11)
            .await
            .unwrap();
        assert!(storage.exists(key.as_str()).await.unwrap());

        let artifact = stager.materialize(&key).await.unwrap();
        assert_eq!(artifact.size(), 11);
        assert_eq!(
            tokio::fs::read(artifact.path()).await.unwrap(),
            b"hello world"
        );
        assert!(artifact.path().starts_with(dir.path().join("artifacts")));

        stager.delete(&key).await.unwrap();
        assert!(!storage.exists(key.as_str()).await.unwrap());
        stager.delete(&key).await.unwrap();

        artifact.release().unwrap();
    }

    #[tokio::test]
    async fn test_short_source_is_a_write_failure() {
        let dir = tempdir().unwrap();
        let (stager, _) = stager(dir.path()).await;
        let key = stager.allocate_key();

        let err = stager
            .stage(&key, chunks(&[b"abc"]), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StagerError::LengthMismatch {
                expected: 10,
                actual: 3,
                ..
            }
        ));
        assert!(err.is_write());
    }

    #[tokio::test]
    async fn test_oversized_source_is_cut_off() {
        let dir = tempdir().unwrap();
        let (stager, storage) = stager(dir.path()).await;
        let key = stager.allocate_key();

        let err = stager
            .stage(&key, chunks(&[b"abcd", b"efgh"]), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StagerError::Write { .. }));
        assert!(!storage.exists(key.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_source_error_is_a_write_failure() {
        let dir = tempdir().unwrap();
        let (stager, _) = stager(dir.path()).await;
        let key = stager.allocate_key();

        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::other("connection reset")),
        ];
        let err = stager
            .stage(&key, Box::pin(futures::stream::iter(items)), 4)
            .await
            .unwrap_err();
        assert!(err.is_write());
    }

    #[tokio::test]
    async fn test_materialize_missing_key() {
        let dir = tempdir().unwrap();
        let (stager, _) = stager(dir.path()).await;

        let err = stager
            .materialize(&StagedKey::from("staging/missing".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StagerError::NotFound(_)));
        assert!(!err.is_write());

        let leftovers = std::fs::read_dir(dir.path().join("artifacts")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
