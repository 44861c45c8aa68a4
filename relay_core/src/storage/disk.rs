use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use super::naming::is_safe_stored_name;

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn initialize(&self) -> Result<()> {
        if !self.root.exists() {
            async_fs::create_dir_all(&self.root).await?;
        }
        Ok(())
    }

    fn path_for(&self, stored_name: &str) -> Result<PathBuf> {
        if !is_safe_stored_name(stored_name) {
            return Err(AppError::Storage(format!(
                "Refusing unsafe stored name: {:?}",
                stored_name
            )));
        }
        Ok(self.root.join(stored_name))
    }

    /// Creates a new file that is deleted again unless [`StagedFile::commit`]
    /// succeeds.
    pub async fn stage(&self, stored_name: &str) -> Result<StagedFile> {
        let path = self.path_for(stored_name)?;
        let file = async_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                tracing::error!(path = %path.display(), "Failed to create upload file: {}", e);
                AppError::Storage(format!("Failed to create {}: {}", path.display(), e))
            })?;

        Ok(StagedFile {
            path,
            file: Some(file),
            written: 0,
            committed: false,
        })
    }

    /// Opens a stored file for reading. `Ok(None)` means the file is gone.
    pub async fn open(&self, stored_name: &str) -> Result<Option<(async_fs::File, u64)>> {
        let path = self.path_for(stored_name)?;
        let file = match async_fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to open stored file: {}", e);
                return Err(AppError::IoError(e));
            }
        };
        let len = file.metadata().await?.len();
        Ok(Some((file, len)))
    }

    /// Returns `false` when the file was already absent.
    pub async fn remove(&self, stored_name: &str) -> Result<bool> {
        let path = self.path_for(stored_name)?;
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to delete stored file: {}", e);
                Err(AppError::IoError(e))
            }
        }
    }

    pub async fn exists(&self, stored_name: &str) -> Result<bool> {
        let path = self.path_for(stored_name)?;
        Ok(async_fs::try_exists(&path).await?)
    }

    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        let mut dir = match async_fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(AppError::IoError(e)),
        };

        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::IoError(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            files.push(StoredFile {
                name,
                size: metadata.len(),
                modified,
            });
        }

        Ok(files)
    }
}

/// A file being written by an upload.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    file: Option<async_fs::File>,
    written: u64,
    committed: bool,
}

impl StagedFile {
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(AppError::InternalServerError)?;
        file.write_all(chunk).await.map_err(|e| {
            tracing::error!(path = %self.path.display(), "Failed to write upload chunk: {}", e);
            AppError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes and syncs the file, returning the number of bytes written.
    pub async fn commit(mut self) -> Result<u64> {
        let mut file = self.file.take().ok_or(AppError::InternalServerError)?;
        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            tracing::error!(path = %self.path.display(), "Failed to sync upload: {}", e);
            AppError::Storage(format!("Failed to sync {}: {}", self.path.display(), e))
        })?;
        drop(file);

        self.committed = true;
        Ok(self.written)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to remove partial upload: {}", e)
            }
        }
    }
}
