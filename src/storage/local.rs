//! Local filesystem storage implementation.
//!
//! Snapshots are written atomically (temp file, then rename) so a crash in
//! the middle of a checkpoint leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlState, PathsConfig, snapshot};
use crate::storage::SnapshotStorage;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    snapshot_key: String,
    report_key: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, paths: &PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            snapshot_key: paths.snapshot_file.clone(),
            report_key: paths.report_file.clone(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.path(&self.snapshot_key)
    }

    pub fn report_path(&self) -> PathBuf {
        self.path(&self.report_key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write the rendered report. The file name does not depend on the format.
    pub async fn write_report(&self, contents: &str) -> Result<PathBuf> {
        self.write_bytes(&self.report_key, contents.as_bytes())
            .await?;
        let path = self.report_path();
        log::info!("Report written to {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn save_snapshot(&self, state: &CrawlState) -> Result<()> {
        let bytes = snapshot::encode(state)?;
        self.write_bytes(&self.snapshot_key, &bytes).await?;
        log::debug!(
            "Snapshot saved to {} ({} accepted posts)",
            self.snapshot_path().display(),
            state.global_count
        );
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<CrawlState> {
        match self.read_bytes(&self.snapshot_key).await? {
            Some(bytes) => snapshot::decode(&bytes),
            None => Err(AppError::data_file(format!(
                "snapshot not found at {}",
                self.snapshot_path().display()
            ))),
        }
    }
}
