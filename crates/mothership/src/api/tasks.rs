// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task status, result, and log endpoints.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use borg_core::{LogLevel, TaskId, TaskLog, TaskStatus};
use borg_storage::UpdateStatusParams;
use borg_wire::{kind, normalize_exit_code, Ack, LogChunk, StatusUpdateRequest};
use chrono::{DateTime, TimeZone, Utc};

use super::require_session;
use crate::error::ApiError;
use crate::server::AppState;

fn parse_task_status(s: &str) -> Option<TaskStatus> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

fn wire_timestamp(unix_seconds: i64) -> Option<DateTime<Utc>> {
    (unix_seconds > 0).then(|| Utc.timestamp_opt(unix_seconds, 0).single()).flatten()
}

/// Shared by the HTTP endpoint and the agent channel: apply a status
/// update and fan the change out to the dashboard.
pub(crate) fn apply_status_update(
    state: &AppState,
    task_id: &TaskId,
    req: StatusUpdateRequest,
) -> Result<(), ApiError> {
    let status = if req.status.is_empty() {
        None
    } else {
        Some(
            parse_task_status(&req.status)
                .ok_or_else(|| ApiError::invalid(format!("unknown task status {:?}", req.status)))?,
        )
    };

    state.store.update_status(
        task_id,
        UpdateStatusParams {
            status,
            exit_code: normalize_exit_code(req.exit_code),
            error_message: req.error_message,
            stdout: req.stdout,
            stderr: req.stderr,
            timestamp: wire_timestamp(req.timestamp),
        },
    )?;

    if let Ok(task) = state.store.get_task(task_id) {
        state.dashboard.broadcast_event(kind::TASK_UPDATE, &task);
        if task.is_terminal() {
            if let Ok(job) = state.store.get_job(&task.job_id) {
                state.dashboard.broadcast_event(kind::JOB_UPDATE, &job);
            }
        }
    }
    Ok(())
}

/// Shared by the HTTP endpoint and the agent channel: append one log line.
pub(crate) fn apply_log_chunk(state: &AppState, chunk: LogChunk) -> Result<(), ApiError> {
    let level = match chunk.level.as_str() {
        "stderr" => LogLevel::Stderr,
        "info" => LogLevel::Info,
        "error" => LogLevel::Error,
        _ => LogLevel::Stdout,
    };
    let task_id = TaskId::new(chunk.task_id);
    state
        .store
        .append_log(&task_id, level, chunk.message, wire_timestamp(chunk.timestamp))?;
    Ok(())
}

/// `POST /api/v1/tasks/:id/status`
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    apply_status_update(&state, &TaskId::new(id), req)?;
    Ok(Json(Ack::ok()))
}

/// `POST /api/v1/tasks/:id/result` — executor_binary result JSON.
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(result): Json<serde_json::Value>,
) -> Result<Json<Ack>, ApiError> {
    state.store.record_result(&TaskId::new(id), result)?;
    Ok(Json(Ack::ok()))
}

/// `GET /api/v1/tasks/:id/logs` — ascending by timestamp.
pub async fn logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<TaskLog>>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.task_logs(&TaskId::new(id))?))
}
