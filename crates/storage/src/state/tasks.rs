// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and task-log event handlers.

use borg_core::{Event, TaskLog, TaskStatus};

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::TaskCreated { task } => {
            if !state.tasks.contains_key(&task.id) {
                state.tasks.insert(task.id.clone(), task.clone());
            }
        }

        Event::TaskAssigned { task_id, runner_id, at } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.runner_id = Some(runner_id.clone());
                task.status = TaskStatus::Running;
                task.started_at = Some(*at);
            }
        }

        Event::TaskStatusChanged { task_id, status, exit_code, error_message, at } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.status = *status;
                task.exit_code = *exit_code;
                if !error_message.is_empty() {
                    task.error_message = error_message.clone();
                }
                if status.is_terminal() {
                    // Keep the first terminal timestamp on replay.
                    if task.completed_at.is_none() {
                        task.completed_at = Some(*at);
                    }
                }
            }
        }

        Event::TaskLogAppended { task_id, level, message, at } => {
            state.task_logs.entry(task_id.clone()).or_default().push(TaskLog {
                task_id: task_id.clone(),
                level: *level,
                message: message.clone(),
                timestamp: *at,
            });
        }

        Event::TaskResultRecorded { task_id, result } => {
            if let Some(task) = state.tasks.get_mut(task_id) {
                task.result = Some(result.clone());
            }
        }

        _ => {}
    }
}
