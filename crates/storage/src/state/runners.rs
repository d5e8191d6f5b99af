// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry event handlers.

use borg_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        // Upsert: the merged row (fresh registration or revive-and-update)
        // is computed by the Store before the event is emitted, so applying
        // twice writes the same row twice.
        Event::RunnerRegistered { runner } => {
            state.runners.insert(runner.id.clone(), runner.clone());
        }

        Event::RunnerHeartbeat { runner_id, status, active_tasks, resources, at } => {
            if let Some(runner) = state.runners.get_mut(runner_id) {
                runner.status = *status;
                runner.active_tasks = *active_tasks;
                runner.last_heartbeat = *at;
                if let Some(delta) = resources {
                    if let Some(v) = delta.disk_space_gb {
                        runner.resources.disk_space_gb = v;
                    }
                    if let Some(v) = delta.total_disk_space_gb {
                        runner.resources.total_disk_space_gb = v;
                    }
                    if let Some(v) = delta.memory_gb {
                        runner.resources.memory_gb = v;
                    }
                    if let Some(ips) = &delta.public_ips {
                        runner.resources.public_ips = ips.clone();
                    }
                }
            }
        }

        Event::RunnerRenamed { runner_id, name } => {
            if let Some(runner) = state.runners.get_mut(runner_id) {
                runner.name = name.clone();
            }
        }

        Event::RunnerDeleted { runner_id, at } => {
            if let Some(runner) = state.runners.get_mut(runner_id) {
                if runner.deleted_at.is_none() {
                    runner.deleted_at = Some(*at);
                }
            }
        }

        Event::RunnerScreenSettingsChanged { runner_id, settings } => {
            if let Some(runner) = state.runners.get_mut(runner_id) {
                runner.screen_settings = *settings;
            }
        }

        _ => {}
    }
}
