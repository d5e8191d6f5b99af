// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job event handlers.

use borg_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::JobCreated { job, files } => {
            // Idempotency: a replayed create never clobbers later updates.
            if !state.jobs.contains_key(&job.id) {
                state.jobs.insert(job.id.clone(), job.clone());
            }
            if !files.is_empty() && !state.job_files.contains_key(&job.id) {
                state.job_files.insert(job.id.clone(), files.clone());
            }
        }

        Event::JobStatusChanged { job_id, status, at } => {
            if let Some(job) = state.jobs.get_mut(job_id) {
                job.status = *status;
                job.updated_at = *at;
            }
        }

        _ => {}
    }
}
