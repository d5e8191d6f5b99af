// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard-facing request/response shapes.

use borg_core::{normalize_args, normalize_env, FileId, JobKind, NewJob, Priority, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generic acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true, message: String::new() }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

/// Error body: message plus machine-readable kind tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// `POST /api/v1/auth/login` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Operator principal as exposed over the API (no credential material).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&borg_core::User> for UserInfo {
    fn from(u: &borg_core::User) -> Self {
        Self { id: u.id.clone(), username: u.username.clone(), created_at: u.created_at }
    }
}

/// Login result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Required-file reference on job creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFileRef {
    pub file_id: String,
    #[serde(default)]
    pub destination_path: String,
}

/// `POST /api/v1/jobs` body.
///
/// `args` and `env` accept arbitrary JSON; they are normalized into an
/// ordered string list and a string map right here at the boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
    #[serde(default)]
    pub env: Option<serde_json::Value>,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub max_retries: i32,
    #[serde(default)]
    pub retry_delay_seconds: i64,
    #[serde(default)]
    pub docker_image: String,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub executor_binary_id: Option<String>,
    #[serde(default)]
    pub processor_script_id: Option<String>,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub files: Vec<JobFileRef>,
}

impl CreateJobRequest {
    /// Normalize into the validated creation parameters.
    pub fn into_new_job(self, created_by: Option<UserId>) -> NewJob {
        let kind = if self.kind.is_empty() { JobKind::Shell } else { JobKind::parse(&self.kind) };
        NewJob {
            name: self.name,
            description: self.description,
            kind,
            priority: self.priority.map(Priority::from_i32).unwrap_or_default(),
            command: self.command,
            args: normalize_args(self.args.as_ref()),
            env: normalize_env(self.env.as_ref()),
            working_directory: self.working_directory,
            timeout_seconds: self.timeout_seconds.max(0),
            max_retries: self.max_retries.max(0),
            retry_delay_seconds: self.retry_delay_seconds.max(0),
            docker_image: self.docker_image,
            privileged: self.privileged,
            executor_binary_id: self.executor_binary_id.map(FileId::new),
            processor_script_id: self.processor_script_id.map(FileId::new),
            dataset_id: self.dataset_id.map(FileId::new),
            metadata: self.metadata,
            created_by,
            files: self
                .files
                .into_iter()
                .map(|f| (FileId::new(f.file_id), f.destination_path))
                .collect(),
        }
    }
}

/// `GET /api/v1/jobs` page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<borg_core::Job>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// `GET /api/v1/stats` body: one atomic snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub jobs: HashMap<String, usize>,
    pub tasks: HashMap<String, usize>,
    pub runners: usize,
}

/// `PATCH /api/v1/runners/:id/rename` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// `PATCH /api/v1/runners/:id/screen-settings` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenSettingsRequest {
    #[serde(default)]
    pub quality: Option<i64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub screen_index: Option<i64>,
}

/// One monitor advertised by a runner (`GET /runners/:id/screens`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub index: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}
