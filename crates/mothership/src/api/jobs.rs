// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use borg_core::{Job, JobId, JobStatus, TaskStatus};
use borg_wire::{kind, Ack, CreateJobRequest, Envelope, JobListResponse};
use serde::Deserialize;

use super::require_session;
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    status: Option<String>,
}

/// `GET /api/v1/jobs?limit&offset&status`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    require_session(&state, &headers)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let offset = query.offset.unwrap_or(0);
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            serde_json::from_value::<JobStatus>(serde_json::Value::String(s.to_string()))
                .map_err(|_| ApiError::invalid(format!("unknown status filter {s:?}")))?,
        ),
    };

    let (jobs, total) = state.store.list_jobs(limit, offset, status);
    Ok(Json(JobListResponse { jobs, total, limit, offset }))
}

/// `POST /api/v1/jobs`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let user_id = require_session(&state, &headers)?;
    let job = state.store.enqueue(req.into_new_job(Some(user_id)))?;
    tracing::info!(job_id = %job.id, name = %job.name, "job enqueued");
    state.dashboard.broadcast_event(kind::JOB_UPDATE, &job);
    Ok((StatusCode::CREATED, Json(job)))
}

/// `GET /api/v1/jobs/:id`
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.get_job(&JobId::new(id))?))
}

/// `POST /api/v1/jobs/:id/pause`
pub async fn pause(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    require_session(&state, &headers)?;
    let job_id = JobId::new(id);
    state.store.pause_job(&job_id)?;
    broadcast_job(&state, &job_id);
    Ok(Json(Ack::with_message("job paused")))
}

/// `POST /api/v1/jobs/:id/resume`
pub async fn resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    require_session(&state, &headers)?;
    let job_id = JobId::new(id);
    state.store.resume_job(&job_id)?;
    broadcast_job(&state, &job_id);
    Ok(Json(Ack::with_message("job resumed")))
}

/// `POST /api/v1/jobs/:id/cancel`
///
/// Marks state first, then best-effort pushes `cancel` to the runners
/// holding the job's running tasks.
pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    require_session(&state, &headers)?;
    let job_id = JobId::new(id);

    // Capture running assignments before the store flips them.
    let running: Vec<(String, borg_core::RunnerId)> = state
        .store
        .job_tasks(&job_id)
        .into_iter()
        .filter(|t| t.status == TaskStatus::Running)
        .filter_map(|t| t.runner_id.clone().map(|r| (t.id.to_string(), r)))
        .collect();

    state.store.cancel_job(&job_id)?;

    for (task_id, runner_id) in running {
        let env = match Envelope::new(kind::CANCEL, &serde_json::json!({ "task_id": task_id })) {
            Ok(env) => env,
            Err(_) => continue,
        };
        if !state.agents.send(&runner_id, env) {
            tracing::debug!(%runner_id, "cancel push skipped, runner not connected");
        }
    }

    broadcast_job(&state, &job_id);
    Ok(Json(Ack::with_message("job cancelled")))
}

fn broadcast_job(state: &AppState, job_id: &JobId) {
    if let Ok(job) = state.store.get_job(job_id) {
        state.dashboard.broadcast_event(kind::JOB_UPDATE, &job);
    }
}
