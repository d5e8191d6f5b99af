// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push dispatch loop for WebSocket-connected runners.
//!
//! HTTP runners pull work by polling `tasks/next`; WS runners are pushed
//! `task` envelopes instead. Each tick walks the connected agents and
//! assigns while the runner advertises spare capacity. A runner that
//! stops heartbeating stops being offered work the moment its connection
//! drops — liveness is never consulted here, only the task state machine.

use borg_core::consts::POLL_INTERVAL;
use borg_wire::{kind, Envelope};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api;
use crate::server::AppState;

/// Run until cancelled.
pub async fn run(state: AppState, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("dispatch loop stopped");
                return;
            }
            _ = tick.tick() => {}
        }

        for runner_id in state.agents.connected() {
            let Ok(runner) = state.store.get_runner(&runner_id) else {
                continue;
            };
            let mut capacity =
                (runner.max_concurrent_tasks - runner.active_tasks).max(0) as usize;

            while capacity > 0 {
                let assignment = match state.store.next_task(&runner_id) {
                    Ok(Some(assignment)) => assignment,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(%runner_id, %e, "dispatch: next_task failed");
                        break;
                    }
                };
                let descriptor = api::descriptor_for(&assignment);
                let task_id = assignment.task.id.clone();

                let Ok(envelope) = Envelope::new(kind::TASK, &descriptor) else {
                    break;
                };
                if state.agents.send(&runner_id, envelope) {
                    info!(%task_id, %runner_id, "task dispatched via push");
                    state.dashboard.broadcast_event(kind::TASK_UPDATE, &assignment.task);
                    capacity -= 1;
                } else {
                    // The task is already assigned in the store; surface it
                    // loudly rather than silently stranding the attempt.
                    warn!(%task_id, %runner_id, "dispatch: push failed after assignment");
                    break;
                }
            }
            debug!(%runner_id, "dispatch tick complete");
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
