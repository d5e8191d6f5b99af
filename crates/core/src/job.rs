// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and state machine.

use crate::id::{FileId, JobId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a job.
///
/// Transitions are monotone within pending → running → terminal, with
/// paused as a side path back to pending/running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Scheduling priority. Higher values dispatch first within the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_i32(&self) -> i32 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }

    /// Clamp an arbitrary wire value into the known range.
    pub fn from_i32(v: i32) -> Self {
        match v {
            i32::MIN..=0 => Priority::Low,
            1 => Priority::Normal,
            2 => Priority::High,
            _ => Priority::Urgent,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Serialize for Priority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i32::deserialize(deserializer)?;
        Ok(Priority::from_i32(v))
    }
}

/// What kind of payload a job executes.
///
/// The wire form is a plain string; unknown names select a pluggable
/// runtime configured on the runner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKind {
    Shell,
    Binary,
    Docker,
    ExecutorBinary,
    Runtime(String),
}

impl JobKind {
    pub fn as_str(&self) -> &str {
        match self {
            JobKind::Shell => "shell",
            JobKind::Binary => "binary",
            JobKind::Docker => "docker",
            JobKind::ExecutorBinary => "executor_binary",
            JobKind::Runtime(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "shell" => JobKind::Shell,
            "binary" => JobKind::Binary,
            "docker" => JobKind::Docker,
            "executor_binary" => JobKind::ExecutorBinary,
            other => JobKind::Runtime(other.to_string()),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(JobKind::parse(&s))
    }
}

/// A user-submitted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: Priority,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working-directory suffix inside the task directory.
    #[serde(default)]
    pub working_directory: String,
    /// Seconds; 0 means no deadline.
    #[serde(default)]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub max_retries: i32,
    /// Seconds a retry task waits before becoming eligible. 0 = immediate.
    #[serde(default)]
    pub retry_delay_seconds: i64,
    #[serde(default)]
    pub docker_image: String,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_binary_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_script_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<FileId>,
    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Validated parameters for creating a job.
///
/// Produced at the API boundary: `args`/`env` arrive as arbitrary JSON and
/// are normalized here, never deeper in the stack.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub name: String,
    pub description: String,
    pub kind: JobKind,
    pub priority: Priority,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_directory: String,
    pub timeout_seconds: i64,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub docker_image: String,
    pub privileged: bool,
    pub executor_binary_id: Option<FileId>,
    pub processor_script_id: Option<FileId>,
    pub dataset_id: Option<FileId>,
    pub metadata: serde_json::Value,
    pub created_by: Option<UserId>,
    /// Required input files with their destination paths.
    pub files: Vec<(FileId, String)>,
}

impl Default for JobKind {
    fn default() -> Self {
        JobKind::Shell
    }
}

/// Normalize an arbitrary JSON value into an ordered argument list.
///
/// Arrays keep element order; non-string elements are rendered as compact
/// JSON. A bare scalar becomes a single-element list. Anything else
/// (objects, null, absent) becomes the empty list.
pub fn normalize_args(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Number(n)) => vec![n.to_string()],
        Some(serde_json::Value::Bool(b)) => vec![b.to_string()],
        _ => Vec::new(),
    }
}

/// Normalize an arbitrary JSON value into an environment mapping.
///
/// Objects map string keys to stringified values; anything else becomes
/// the empty mapping.
pub fn normalize_env(value: Option<&serde_json::Value>) -> HashMap<String, String> {
    match value {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                let val = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), val)
            })
            .collect(),
        _ => HashMap::new(),
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = "job-1",
            name: String = "test-job",
            description: String = "",
            command: String = "echo hi",
            working_directory: String = "",
            docker_image: String = "",
        }
        set {
            kind: JobKind = JobKind::Shell,
            status: JobStatus = JobStatus::Pending,
            priority: Priority = Priority::Normal,
            args: Vec<String> = Vec::new(),
            env: HashMap<String, String> = HashMap::new(),
            timeout_seconds: i64 = 0,
            max_retries: i32 = 0,
            retry_delay_seconds: i64 = 0,
            privileged: bool = false,
            metadata: serde_json::Value = serde_json::Value::Null,
        }
        option {
            executor_binary_id: FileId = None,
            processor_script_id: FileId = None,
            dataset_id: FileId = None,
            created_by: UserId = None,
            deleted_at: DateTime<Utc> = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
