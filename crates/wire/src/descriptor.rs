// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task descriptor delivered to a runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything a runner needs to execute one task.
///
/// Delivered either as the `GET /runners/:id/tasks/next` body (HTTP 200
/// with `null` meaning "no task") or as the `task` envelope on the agent
/// channel. Duplicate delivery must be idempotent at the runner, keyed by
/// `task_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub job_id: String,
    #[serde(default)]
    pub job_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub docker_image: String,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub required_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_binary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_data: Option<serde_json::Value>,
}
