//! Per-run working directory.
//!
//! Each run owns `<root>/run-<uuid>`. The directory is removed when the
//! guard is closed or dropped, so every exit path cleans up.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    /// Create a fresh run directory under `root`.
    pub async fn create(root: &Path, run_id: &Uuid) -> PipelineResult<Self> {
        let path = root.join(format!("run-{}", run_id));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| PipelineError::path_io(&path, e))?;
        debug!(path = %path.display(), "Created working directory");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory, reporting failures.
    pub async fn close(mut self) -> PipelineResult<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::path_io(&self.path, e)),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove working directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_removes_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let run_id = Uuid::new_v4();
        let dir = WorkDir::create(root.path(), &run_id).await.unwrap();
        let path = dir.path().to_path_buf();

        assert!(path.ends_with(format!("run-{}", run_id)));
        std::fs::write(dir.file("turn-0.wav"), b"x").unwrap();

        dir.close().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let path = {
            let dir = WorkDir::create(root.path(), &Uuid::new_v4()).await.unwrap();
            std::fs::write(dir.file("clip.mp4"), b"x").unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
