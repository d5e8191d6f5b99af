// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input files, task artifacts, and the job↔file edge.

use crate::id::{ArtifactId, FileId, JobId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A content-addressed input blob. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: FileId,
    pub name: String,
    pub storage_path: String,
    pub size: u64,
    pub content_type: String,
    pub sha256: String,
    #[serde(default)]
    pub uploaded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Edge binding a required file to a job with a destination path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFile {
    pub job_id: JobId,
    pub file_id: FileId,
    pub destination_path: String,
}

/// A blob produced by a task and uploaded to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub task_id: TaskId,
    pub name: String,
    pub storage_path: String,
    pub size: u64,
    pub content_type: String,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}
