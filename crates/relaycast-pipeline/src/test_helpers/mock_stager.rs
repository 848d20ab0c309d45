//! In-memory object stager

use async_trait::async_trait;
use futures::StreamExt;
use relaycast_core::ByteStream;
use relaycast_storage::{LocalArtifact, ObjectStager, StagedKey, StagerError};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Keeps staged objects in memory and materializes them into real temp
/// files, so tests can check that artifacts are removed from disk.
#[derive(Default)]
pub struct InMemoryStager {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    deleted_keys: Mutex<Vec<String>>,
    artifact_paths: Mutex<Vec<PathBuf>>,
    stage_calls: AtomicUsize,
    fail_stage: bool,
    fail_materialize: bool,
    fail_delete: bool,
    stage_delay: Option<Duration>,
}

impl InMemoryStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Staging writes the first chunk, then fails.
    pub fn failing_stage(mut self) -> Self {
        self.fail_stage = true;
        self
    }

    pub fn failing_materialize(mut self) -> Self {
        self.fail_materialize = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Staging sleeps for `delay` before reading the stream.
    pub fn slow_stage(mut self, delay: Duration) -> Self {
        self.stage_delay = Some(delay);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Every key passed to `delete`, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted_keys.lock().unwrap().clone()
    }

    /// Paths of every artifact handed out.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        self.artifact_paths.lock().unwrap().clone()
    }

    pub fn stage_calls(&self) -> usize {
        self.stage_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStager for InMemoryStager {
    fn allocate_key(&self) -> StagedKey {
        StagedKey::generate("staging")
    }

    async fn stage(
        &self,
        key: &StagedKey,
        mut stream: ByteStream,
        length: u64,
    ) -> Result<(), StagerError> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stage_delay {
            tokio::time::sleep(delay).await;
        }

        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StagerError::Write {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            data.extend_from_slice(&chunk);

            if self.fail_stage {
                self.objects
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), data.clone());
                return Err(StagerError::Write {
                    key: key.to_string(),
                    message: "quota exceeded".to_string(),
                });
            }
        }

        let actual = data.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), data);

        if actual != length {
            return Err(StagerError::LengthMismatch {
                key: key.to_string(),
                expected: length,
                actual,
            });
        }
        Ok(())
    }

    async fn materialize(&self, key: &StagedKey) -> Result<LocalArtifact, StagerError> {
        if self.fail_materialize {
            return Err(StagerError::Read {
                key: key.to_string(),
                message: "connection reset".to_string(),
            });
        }

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| StagerError::NotFound(key.to_string()))?;

        let read_err = |e: std::io::Error| StagerError::Read {
            key: key.to_string(),
            message: e.to_string(),
        };
        let mut file = tempfile::NamedTempFile::new().map_err(read_err)?;
        file.write_all(&data).map_err(read_err)?;
        let path = file.into_temp_path();

        self.artifact_paths.lock().unwrap().push(path.to_path_buf());
        Ok(LocalArtifact::new(path, data.len() as u64))
    }

    async fn delete(&self, key: &StagedKey) -> Result<(), StagerError> {
        self.deleted_keys.lock().unwrap().push(key.to_string());
        if self.fail_delete {
            return Err(StagerError::Delete {
                key: key.to_string(),
                message: "access denied".to_string(),
            });
        }
        self.objects.lock().unwrap().remove(key.as_str());
        Ok(())
    }
}
