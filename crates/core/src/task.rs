// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity — one attempt of a job on one runner — and its log lines.

use crate::id::{JobId, RunnerId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// One attempt of a job.
///
/// A retry never mutates the failed row; it creates a fresh task with
/// `retry_count + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    /// Assigned on dispatch; a running task always has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<RunnerId>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// `None` means "no exit code available" (wire sentinel −1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub retry_count: i32,
    /// Per-task input row for executor_binary jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_data: Option<serde_json::Value>,
    /// Result JSON reported by executor_binary jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    /// Earliest time the task may be dispatched (retry delay); absent
    /// means immediately eligible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Severity/stream tag of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Stdout,
    Stderr,
    Info,
    Error,
}

crate::simple_display! {
    LogLevel {
        Stdout => "stdout",
        Stderr => "stderr",
        Info => "info",
        Error => "error",
    }
}

/// Append-only log line attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLog {
    pub task_id: TaskId,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            id: TaskId = "task-1",
            job_id: JobId = "job-1",
            error_message: String = "",
        }
        set {
            status: TaskStatus = TaskStatus::Pending,
            retry_count: i32 = 0,
        }
        option {
            runner_id: RunnerId = None,
            started_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
            exit_code: i32 = None,
            task_data: serde_json::Value = None,
            result: serde_json::Value = None,
            not_before: DateTime<Utc> = None,
        }
        computed {
            created_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
