// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stats and health endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use borg_wire::StatsResponse;

use super::require_session;
use crate::error::ApiError;
use crate::server::AppState;

/// `GET /api/v1/stats` — one atomic snapshot of queue and fleet counts.
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, ApiError> {
    require_session(&state, &headers)?;
    let stats = state.store.stats();
    Ok(Json(StatsResponse { jobs: stats.jobs, tasks: stats.tasks, runners: stats.runners }))
}

/// `GET /healthz`
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
