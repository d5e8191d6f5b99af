// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session endpoints: login and whoami.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use borg_wire::{LoginRequest, LoginResponse, UserInfo};

use super::require_session;
use crate::auth::verify_password;
use crate::error::ApiError;
use crate::server::AppState;

/// `POST /api/v1/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .store
        .user_by_name(&req.username)
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("invalid username or password"))?;

    let token = state.sessions.issue(user.id.clone());
    tracing::info!(username = %user.username, "operator logged in");
    Ok(Json(LoginResponse { token, user: UserInfo::from(&user) }))
}

/// `GET /api/v1/auth/me`
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, ApiError> {
    let user_id = require_session(&state, &headers)?;
    let user = state
        .store
        .get_user(&user_id)
        .ok_or_else(|| ApiError::unauthorized("session user no longer exists"))?;
    Ok(Json(UserInfo::from(&user)))
}
