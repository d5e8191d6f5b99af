// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat request/response shapes.

use borg_core::event::ResourceDelta;
use serde::{Deserialize, Serialize};

/// `POST /api/v1/runners/:id/heartbeat` body, also the `heartbeat`
/// envelope payload on the agent channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Runner id; carried in the body on the WS path (the URL names it on
    /// the HTTP path).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runner_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub active_tasks: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceDelta>,
}

/// Heartbeat ack carrying the server-recommended next interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    pub next_heartbeat_interval: u64,
}
