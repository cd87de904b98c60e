//! Filesystem helpers for writing deliverables atomically.
//!
//! Final files are produced through a temporary sibling (same directory,
//! hence same filesystem) that is renamed over the destination only once it
//! is complete. Dropping the temporary without persisting removes it.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs;
use tracing::warn;

use crate::error::{MediaError, MediaResult};

/// Create the parent directory of `path` if it is missing.
///
/// Returns the outermost directory that did not exist before the call.
pub async fn ensure_parent_dir(path: &Path) -> MediaResult<Option<PathBuf>> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(None);
    };

    let created = parent
        .ancestors()
        .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
        .last()
        .map(Path::to_path_buf);

    if created.is_some() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| MediaError::path_io(parent, e))?;
    }
    Ok(created)
}

/// A hidden temporary file next to its destination.
///
/// Directories created to hold it are removed again unless the file is
/// persisted.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    created_dir: Option<PathBuf>,
}

impl StagedFile {
    /// Stage an empty file for `dst`.
    ///
    /// The file keeps `dst`'s extension so tools that infer the container
    /// from the name still work.
    pub async fn create(dst: &Path) -> MediaResult<Self> {
        let created_dir = ensure_parent_dir(dst).await?;

        let dir = match dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let stem = dst
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let suffix = dst
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", stem))
            .suffix(&format!(".part{}", suffix))
            .tempfile_in(&dir);

        match temp {
            Ok(temp) => Ok(Self { temp, created_dir }),
            Err(e) => {
                remove_created_dir(created_dir.as_deref()).await;
                Err(MediaError::path_io(&dir, e))
            }
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Rename the finished file over `dst`.
    pub async fn persist(self, dst: &Path) -> MediaResult<()> {
        let Self { temp, created_dir } = self;
        match temp.persist(dst) {
            Ok(_) => Ok(()),
            Err(e) => {
                drop(e.file);
                remove_created_dir(created_dir.as_deref()).await;
                Err(MediaError::path_io(dst, e.error))
            }
        }
    }

    /// Delete the file and any directory created for it.
    pub async fn discard(self) {
        let Self { temp, created_dir } = self;
        drop(temp);
        remove_created_dir(created_dir.as_deref()).await;
    }
}

async fn remove_created_dir(dir: Option<&Path>) {
    let Some(dir) = dir else {
        return;
    };
    if let Err(e) = fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %dir.display(), error = %e, "Failed to remove output directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_staged_file_lives_next_to_destination() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("nested").join("movie.mp4");

        let staged = StagedFile::create(&dst).await.unwrap();
        assert_eq!(staged.path().parent(), dst.parent());

        let name = staged.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".movie.mp4."));
        assert!(name.ends_with(".part.mp4"));
    }

    #[tokio::test]
    async fn test_persist_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("movie.mp4");
        fs::write(&dst, b"old").await.unwrap();

        let staged = StagedFile::create(&dst).await.unwrap();
        fs::write(staged.path(), b"new").await.unwrap();
        let temp_path = staged.path().to_path_buf();

        staged.persist(&dst).await.unwrap();
        assert_eq!(fs::read(&dst).await.unwrap(), b"new");
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("movie.mp4");

        let staged = StagedFile::create(&dst).await.unwrap();
        let temp_path = staged.path().to_path_buf();
        staged.discard().await;

        assert!(!temp_path.exists());
        assert!(!dst.exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_discard_removes_created_directories() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("a").join("b").join("movie.mp4");

        let staged = StagedFile::create(&dst).await.unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
        staged.discard().await;

        assert!(!dir.path().join("a").exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_persist_keeps_created_directories() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("out").join("movie.mp4");

        let staged = StagedFile::create(&dst).await.unwrap();
        fs::write(staged.path(), b"movie").await.unwrap();
        staged.persist(&dst).await.unwrap();

        assert_eq!(fs::read(&dst).await.unwrap(), b"movie");
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_reports_outermost_new_dir() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("x").join("y").join("f.wav");

        let created = ensure_parent_dir(&dst).await.unwrap();
        assert_eq!(created.as_deref(), Some(dir.path().join("x").as_path()));
        assert_eq!(ensure_parent_dir(&dst).await.unwrap(), None);
    }
}
