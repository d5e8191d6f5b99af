// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP request handlers.

pub mod auth;
pub mod files;
pub mod jobs;
pub mod runners;
pub mod stats;
pub mod tasks;
pub mod ws;

use axum::http::HeaderMap;
use borg_core::{JobFile, UserId};
use borg_storage::TaskAssignment;
use borg_wire::TaskDescriptor;

use crate::error::ApiError;
use crate::server::AppState;

/// Resolve the caller's session or fail with Unauthorized.
pub(crate) fn require_session(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = crate::auth::bearer_token(headers)
        .ok_or_else(|| ApiError::unauthorized("session token required"))?;
    state
        .sessions
        .resolve(token)
        .ok_or_else(|| ApiError::unauthorized("invalid or expired session"))
}

/// Build the wire descriptor for an assignment.
///
/// The executor binary rides in `required_files` so the runner's download
/// loop fetches it like any other input.
pub(crate) fn descriptor_for(assignment: &TaskAssignment) -> TaskDescriptor {
    let job = &assignment.job;
    let mut required_files: Vec<String> =
        assignment.required_files.iter().map(|f: &JobFile| f.file_id.to_string()).collect();
    if let Some(binary_id) = &job.executor_binary_id {
        if !required_files.iter().any(|id| id == binary_id.as_str()) {
            required_files.push(binary_id.to_string());
        }
    }
    TaskDescriptor {
        task_id: assignment.task.id.to_string(),
        job_id: job.id.to_string(),
        job_name: job.name.clone(),
        kind: job.kind.as_str().to_string(),
        command: job.command.clone(),
        args: job.args.clone(),
        env: job.env.clone(),
        working_directory: job.working_directory.clone(),
        timeout_seconds: job.timeout_seconds,
        docker_image: job.docker_image.clone(),
        privileged: job.privileged,
        required_files,
        executor_binary_id: job.executor_binary_id.as_ref().map(|id| id.to_string()),
        task_data: assignment.task.task_data.clone(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
