//! Run-local file copies of staged objects.

use std::io;
use std::path::Path;
use tempfile::TempPath;

/// A local, file-backed copy of a staged object.
///
/// The file is removed when the artifact is released or dropped, so every
/// exit path of the owning run gives the disk space back.
#[derive(Debug)]
pub struct LocalArtifact {
    path: TempPath,
    size: u64,
}

impl LocalArtifact {
    pub fn new(path: TempPath, size: u64) -> Self {
        LocalArtifact { path, size }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    /// Delete the file now, reporting failure instead of swallowing it.
    pub fn release(self) -> io::Result<()> {
        match self.path.close() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
