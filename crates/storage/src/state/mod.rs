// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

mod files;
mod jobs;
mod runners;
mod tasks;

use borg_core::{
    Artifact, ArtifactId, DeviceId, Event, FileId, FileMeta, Job, JobFile, JobId, Runner,
    RunnerId, Task, TaskId, TaskLog, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized state built from WAL events.
///
/// # Idempotency Requirement
///
/// **All event handlers MUST be idempotent.** Applying the same event twice
/// must produce the same state as applying it once: events may be applied
/// both for immediate visibility and again during WAL replay after a crash.
///
/// Guidelines:
/// - Use assignment (`=`) instead of mutation (`+=`, `-=`)
/// - Guard inserts with existence checks
/// - Guard appends with duplicate checks where the event carries an identity
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub users: HashMap<UserId, User>,
    pub runners: HashMap<RunnerId, Runner>,
    pub jobs: HashMap<JobId, Job>,
    #[serde(default)]
    pub job_files: HashMap<JobId, Vec<JobFile>>,
    pub tasks: HashMap<TaskId, Task>,
    #[serde(default)]
    pub task_logs: HashMap<TaskId, Vec<TaskLog>>,
    #[serde(default)]
    pub files: HashMap<FileId, FileMeta>,
    #[serde(default)]
    pub artifacts: HashMap<ArtifactId, Artifact>,
}

impl MaterializedState {
    /// Apply an event to derive state changes.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobCreated { .. } | Event::JobStatusChanged { .. } => jobs::apply(self, event),

            Event::TaskCreated { .. }
            | Event::TaskAssigned { .. }
            | Event::TaskStatusChanged { .. }
            | Event::TaskLogAppended { .. }
            | Event::TaskResultRecorded { .. } => tasks::apply(self, event),

            Event::RunnerRegistered { .. }
            | Event::RunnerHeartbeat { .. }
            | Event::RunnerRenamed { .. }
            | Event::RunnerDeleted { .. }
            | Event::RunnerScreenSettingsChanged { .. } => runners::apply(self, event),

            Event::FileAdded { .. } | Event::ArtifactAdded { .. } | Event::UserAdded { .. } => {
                files::apply(self, event)
            }
        }
    }

    /// Live (not soft-deleted) runner matching a device id.
    pub fn runner_by_device(&self, device_id: &DeviceId) -> Option<&Runner> {
        if device_id.is_empty() {
            return None;
        }
        self.runners.values().find(|r| &r.device_id == device_id)
    }

    /// Runner matching a hostname, preferring live rows (legacy match key).
    pub fn runner_by_hostname(&self, hostname: &str) -> Option<&Runner> {
        if hostname.is_empty() {
            return None;
        }
        self.runners
            .values()
            .filter(|r| r.hostname == hostname)
            .min_by_key(|r| r.is_deleted())
    }

    /// All tasks belonging to a job, oldest first.
    pub fn job_tasks(&self, job_id: &JobId) -> Vec<&Task> {
        let mut tasks: Vec<&Task> =
            self.tasks.values().filter(|t| &t.job_id == job_id).collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    /// Log lines for a task in non-decreasing timestamp order.
    pub fn task_logs_sorted(&self, task_id: &TaskId) -> Vec<TaskLog> {
        let mut logs = self.task_logs.get(task_id).cloned().unwrap_or_default();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        logs
    }

    /// Operator lookup for login.
    pub fn user_by_name(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
