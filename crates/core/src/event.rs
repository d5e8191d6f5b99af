// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-mutation events.
//!
//! Every durable change to coordination state is expressed as one of these
//! facts, appended to the WAL and applied to the materialized state. All
//! appliers must be idempotent: replay after crash recovery may deliver an
//! event that was already applied.

use crate::file::{Artifact, FileMeta, JobFile};
use crate::id::{JobId, RunnerId, TaskId};
use crate::job::{Job, JobStatus};
use crate::runner::{Runner, ScreenSettings};
use crate::task::{LogLevel, Task, TaskStatus};
use crate::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Partial resource refresh piggybacked on a heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_space_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_disk_space_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ips: Option<Vec<String>>,
}

/// A fact about what happened, in WAL order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A job was accepted, together with its required-file edges.
    JobCreated { job: Job, files: Vec<JobFile> },

    /// A task row came into existence (initial attempt, retry, or resume).
    TaskCreated { task: Task },

    /// `next_task` handed the task to a runner.
    TaskAssigned { task_id: TaskId, runner_id: RunnerId, at: DateTime<Utc> },

    /// A status write, possibly terminal.
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default)]
        error_message: String,
        at: DateTime<Utc>,
    },

    /// One appended log line.
    TaskLogAppended { task_id: TaskId, level: LogLevel, message: String, at: DateTime<Utc> },

    /// Result JSON reported by an executor_binary task.
    TaskResultRecorded { task_id: TaskId, result: serde_json::Value },

    /// Job-level status transition (rollup, pause, resume, cancel, fail).
    JobStatusChanged { job_id: JobId, status: JobStatus, at: DateTime<Utc> },

    /// Upsert of a runner row (fresh registration or revive-and-update;
    /// the merged row is computed before the event is emitted).
    RunnerRegistered { runner: Runner },

    /// Periodic liveness report.
    RunnerHeartbeat {
        runner_id: RunnerId,
        status: crate::runner::RunnerStatus,
        active_tasks: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resources: Option<ResourceDelta>,
        at: DateTime<Utc>,
    },

    /// Operator rename; device identity is never changed through this path.
    RunnerRenamed { runner_id: RunnerId, name: String },

    /// Soft delete; a later registration with the same device id revives.
    RunnerDeleted { runner_id: RunnerId, at: DateTime<Utc> },

    /// Operator-adjusted screen streaming knobs.
    RunnerScreenSettingsChanged { runner_id: RunnerId, settings: ScreenSettings },

    /// An input blob finished uploading.
    FileAdded { file: FileMeta },

    /// A task output blob was recorded.
    ArtifactAdded { artifact: Artifact },

    /// An operator principal was created.
    UserAdded { user: User },
}
