//! Scope-guarded per-task working directory.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::error::WorkerResult;

/// Per-task working directory under `{temp_root}/{video_id}`, removed on
/// drop so every exit path cleans up.
pub(crate) struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub(crate) async fn create(temp_root: &Path, video_id: Uuid) -> WorkerResult<Self> {
        let path = temp_root.join(video_id.to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove work directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workdir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();

        let workdir = WorkDir::create(root.path(), id).await.unwrap();
        let path = workdir.path().to_path_buf();
        tokio::fs::write(path.join("scratch.bin"), b"data")
            .await
            .unwrap();
        assert!(path.exists());

        drop(workdir);
        assert!(!path.exists());
    }
}
