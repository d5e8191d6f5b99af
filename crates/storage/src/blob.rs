// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem blob store for input files, artifacts, and screenshots.
//!
//! Layout under the data directory:
//! - `files/<file_id>` — uploaded inputs
//! - `artifacts/<artifact_id>` — task outputs
//! - `screenshots/<runner_id>/<filename>` — retained screen captures
//!
//! Hashes are computed streaming while bytes are written; nothing is
//! buffered whole in memory.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Errors from blob operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Outcome of a streamed save.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedBlob {
    pub storage_path: String,
    pub sha256: String,
    pub size: u64,
}

/// One retained screenshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScreenshotEntry {
    pub filename: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub size: u64,
}

/// Content store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    fn screenshots_dir(&self, runner_id: &str) -> PathBuf {
        self.root.join("screenshots").join(runner_id)
    }

    /// Stream bytes into a file while hashing; returns path/hash/size.
    async fn save_stream(
        &self,
        path: &Path,
        mut reader: impl AsyncRead + Unpin,
    ) -> Result<SavedBlob, BlobError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as u64;
        }
        file.flush().await?;
        Ok(SavedBlob {
            storage_path: path.to_string_lossy().into_owned(),
            sha256: format!("{:x}", hasher.finalize()),
            size,
        })
    }

    /// Save an uploaded input file under its id.
    pub async fn save_file(
        &self,
        file_id: &str,
        reader: impl AsyncRead + Unpin,
    ) -> Result<SavedBlob, BlobError> {
        self.save_stream(&self.files_dir().join(file_id), reader).await
    }

    /// Open an input file for streamed download.
    pub async fn get_file(&self, file_id: &str) -> Result<tokio::fs::File, BlobError> {
        let path = self.files_dir().join(file_id);
        match tokio::fs::File::open(&path).await {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(file_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save a task artifact under a freshly generated id.
    pub async fn save_artifact(
        &self,
        artifact_id: &str,
        reader: impl AsyncRead + Unpin,
    ) -> Result<SavedBlob, BlobError> {
        self.save_stream(&self.artifacts_dir().join(artifact_id), reader).await
    }

    /// Persist a screenshot under the runner's directory.
    pub async fn save_screenshot(
        &self,
        runner_id: &str,
        filename: &str,
        reader: impl AsyncRead + Unpin,
    ) -> Result<String, BlobError> {
        let saved = self
            .save_stream(&self.screenshots_dir(runner_id).join(filename), reader)
            .await?;
        Ok(saved.storage_path)
    }

    /// Newest screenshots first, capped at `limit`.
    pub async fn list_screenshots(
        &self,
        runner_id: &str,
        limit: usize,
    ) -> Result<Vec<ScreenshotEntry>, BlobError> {
        let dir = self.screenshots_dir(runner_id);
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = read_dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push(ScreenshotEntry {
                filename: entry.file_name().to_string_lossy().into_owned(),
                timestamp: modified.into(),
                size: meta.len(),
            });
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Path of a retained screenshot, if present.
    pub async fn get_screenshot_path(
        &self,
        runner_id: &str,
        filename: &str,
    ) -> Option<PathBuf> {
        let path = self.screenshots_dir(runner_id).join(filename);
        tokio::fs::try_exists(&path).await.ok().filter(|ok| *ok).map(|_| path)
    }
}

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
