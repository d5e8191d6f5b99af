// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry and runner-facing dispatch endpoints.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use borg_core::consts::MAX_FRAME_SIZE;
use borg_core::{DeviceId, ResourceSnapshot, Runner, RunnerId, RunnerStatus, ScreenSettings};
use chrono::Utc;
use borg_storage::{HeartbeatParams, RegisterParams};
use borg_wire::{
    kind, Ack, HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse,
    RenameRequest, ScreenFramePost, ScreenInfo, ScreenSettingsRequest, ScreenStatus,
    TaskDescriptor,
};
use serde::Deserialize;

use super::{descriptor_for, require_session};
use crate::error::ApiError;
use crate::server::AppState;

/// Apply derived offline status for rendering.
fn rendered(mut runner: Runner) -> Runner {
    runner.status = runner.effective_status(Utc::now());
    runner
}

/// `GET /api/v1/runners`
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Runner>>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(state.store.list_runners().into_iter().map(rendered).collect()))
}

/// `GET /api/v1/runners/:id`
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Runner>, ApiError> {
    require_session(&state, &headers)?;
    Ok(Json(rendered(state.store.get_runner(&RunnerId::new(id))?)))
}

#[derive(serde::Serialize)]
pub struct RenameResponse {
    pub success: bool,
    pub runner: Runner,
}

/// `PATCH /api/v1/runners/:id/rename`
pub async fn rename(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<RenameResponse>, ApiError> {
    require_session(&state, &headers)?;
    let runner = state.store.rename_runner(&RunnerId::new(id), &req.name)?;
    state.dashboard.broadcast_event(kind::RUNNER_UPDATE, &runner);
    Ok(Json(RenameResponse { success: true, runner: rendered(runner) }))
}

/// `PATCH /api/v1/runners/:id/screen-settings`
pub async fn screen_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ScreenSettingsRequest>,
) -> Result<Json<Ack>, ApiError> {
    require_session(&state, &headers)?;
    let runner_id = RunnerId::new(id);
    let current = state.store.get_runner(&runner_id)?.screen_settings;
    let settings = ScreenSettings::clamped(
        req.quality.unwrap_or(current.quality as i64),
        req.fps.unwrap_or(current.fps),
        req.screen_index.unwrap_or(current.screen_index as i64),
    );
    state.store.set_screen_settings(&runner_id, settings)?;
    Ok(Json(Ack::ok()))
}

/// `DELETE /api/v1/runners/:id` — Conflict while tasks are active.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Ack>, ApiError> {
    require_session(&state, &headers)?;
    let runner_id = RunnerId::new(id);
    state.store.delete_runner(&runner_id)?;
    state.agents.disconnect(&runner_id);
    Ok(Json(Ack::with_message("runner deleted")))
}

/// `POST /api/v1/runners/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let params = RegisterParams {
        device_id: DeviceId::new(req.device_id),
        name: req.name,
        hostname: req.hostname,
        os: req.os,
        architecture: req.architecture,
        max_concurrent_tasks: req.max_concurrent_tasks,
        labels: req.labels,
        token: req.token,
        resources: ResourceSnapshot {
            cpu_cores: req.cpu_cores,
            cpu_model: req.cpu_model,
            cpu_frequency_mhz: req.cpu_frequency_mhz,
            memory_gb: req.memory_gb,
            disk_space_gb: req.disk_space_gb,
            total_disk_space_gb: req.total_disk_space_gb,
            os_version: req.os_version,
            gpu_info: req.gpu_info,
            public_ips: req.public_ips,
        },
        screen_monitoring_enabled: req.screen_monitoring_enabled,
        runtimes: req.runtimes,
    };

    let runner = state.store.register(params)?;
    tracing::info!(runner_id = %runner.id, name = %runner.name, "runner registered");
    state.dashboard.broadcast_event(kind::RUNNER_UPDATE, &runner);
    Ok(Json(RegisterResponse {
        runner_id: runner.id.to_string(),
        name: runner.name,
        heartbeat_interval_seconds: borg_core::consts::DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
    }))
}

/// `POST /api/v1/runners/:id/heartbeat`
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let interval = state.store.heartbeat(
        &RunnerId::new(id),
        HeartbeatParams {
            status: parse_runner_status(&req.status),
            active_tasks: req.active_tasks,
            resources: req.resources,
        },
    )?;
    Ok(Json(HeartbeatResponse { success: true, next_heartbeat_interval: interval.as_secs() }))
}

pub(crate) fn parse_runner_status(s: &str) -> RunnerStatus {
    match s {
        "busy" => RunnerStatus::Busy,
        _ => RunnerStatus::Idle,
    }
}

/// `GET /api/v1/runners/:id/tasks/next`
///
/// HTTP 200 with body `null` means "no task" — the expected idle
/// condition, never an error.
pub async fn next_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<TaskDescriptor>>, ApiError> {
    let runner_id = RunnerId::new(id);
    let Some(assignment) = state.store.next_task(&runner_id)? else {
        return Ok(Json(None));
    };
    tracing::info!(
        task_id = %assignment.task.id,
        job_id = %assignment.job.id,
        %runner_id,
        "task dispatched via poll"
    );
    state.dashboard.broadcast_event(kind::TASK_UPDATE, &assignment.task);
    Ok(Json(Some(descriptor_for(&assignment))))
}

/// `POST /api/v1/runners/:id/screen/frame` — base64 JSON fallback path.
pub async fn screen_frame(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ScreenFramePost>,
) -> Result<Json<Ack>, ApiError> {
    let frame = B64
        .decode(req.frame.as_bytes())
        .map_err(|_| ApiError::invalid("frame is not valid base64"))?;
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ApiError::invalid("frame exceeds size limit"));
    }
    state.screens.push_frame(&RunnerId::new(id), frame);
    Ok(Json(Ack::ok()))
}

/// `GET /api/v1/runners/:id/screen/status`
pub async fn screen_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScreenStatus>, ApiError> {
    let runner_id = RunnerId::new(id);
    let settings = state.store.get_runner(&runner_id)?.screen_settings;
    let (streaming, viewer_count) = state.screens.status(&runner_id);
    Ok(Json(ScreenStatus {
        streaming,
        viewer_count,
        quality: settings.quality,
        fps: settings.fps,
        screen_index: settings.screen_index,
    }))
}

/// `GET /api/v1/runners/:id/screens`
pub async fn screens(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<ScreenInfo>>, ApiError> {
    require_session(&state, &headers)?;
    let runner_id = RunnerId::new(id);
    state.store.get_runner(&runner_id)?;
    Ok(Json(state.screens.screens(&runner_id)))
}

/// `POST /api/v1/runners/:id/screens` — agent publishes its monitor list.
pub async fn set_screens(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(screens): Json<Vec<ScreenInfo>>,
) -> Result<Json<Ack>, ApiError> {
    let runner_id = RunnerId::new(id);
    state.store.get_runner(&runner_id)?;
    state.screens.set_screens(&runner_id, screens);
    Ok(Json(Ack::ok()))
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// `GET /api/v1/runners/:id/screenshots`
pub async fn screenshots(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ScreenshotQuery>,
) -> Result<Json<Vec<borg_storage::ScreenshotEntry>>, ApiError> {
    require_session(&state, &headers)?;
    let runner_id = RunnerId::new(id);
    state.store.get_runner(&runner_id)?;
    let entries = state
        .blobs
        .list_screenshots(runner_id.as_str(), query.limit.unwrap_or(20).clamp(1, 200))
        .await?;
    Ok(Json(entries))
}
