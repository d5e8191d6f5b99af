// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat loop.
//!
//! Reports liveness and the active-task count on the server-recommended
//! period; every Nth beat piggybacks a fresh resource snapshot.

use borg_core::consts::RESOURCE_BEAT_CADENCE;
use borg_wire::HeartbeatRequest;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dispatcher::TaskCounters;
use crate::transport::Transport;

/// True on the beats that carry a resource refresh.
fn resources_due(beat: u32) -> bool {
    beat % RESOURCE_BEAT_CADENCE == 0
}

/// Apply a server-recommended interval; `None` (WS path, no response
/// body) keeps the current one.
fn next_interval(current: Duration, server: Option<Duration>) -> Duration {
    match server {
        Some(next) if next != current => {
            debug!(seconds = next.as_secs(), "heartbeat interval adjusted by server");
            next
        }
        _ => current,
    }
}

/// Run until shutdown.
pub async fn run(
    transport: Arc<Transport>,
    counters: Arc<TaskCounters>,
    work_dir: PathBuf,
    initial_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = initial_interval;
    let mut beat: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("heartbeat loop stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        beat = beat.wrapping_add(1);
        let active_tasks = counters.active();
        let status = if active_tasks > 0 { "busy" } else { "idle" };

        let resources = if resources_due(beat) {
            Some(crate::resources::delta(&work_dir).await)
        } else {
            None
        };

        let req = HeartbeatRequest {
            runner_id: String::new(),
            status: status.to_string(),
            active_tasks,
            resources,
        };

        match transport.send_heartbeat(req).await {
            Ok(server) => interval = next_interval(interval, server),
            Err(e) => warn!(%e, "heartbeat failed"),
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
