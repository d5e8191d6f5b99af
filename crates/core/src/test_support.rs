// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for tests in this crate and downstream crates.
//!
//! Gated behind the `test-support` feature; production builds never see
//! these items.

use crate::job::{JobKind, NewJob, Priority};

/// A minimal valid [`NewJob`] for queue tests.
pub fn new_shell_job(name: &str, command: &str) -> NewJob {
    NewJob {
        name: name.to_string(),
        kind: JobKind::Shell,
        priority: Priority::Normal,
        command: command.to_string(),
        metadata: serde_json::Value::Null,
        ..NewJob::default()
    }
}

/// A [`NewJob`] with retries configured.
pub fn retrying_job(name: &str, max_retries: i32) -> NewJob {
    NewJob { max_retries, ..new_shell_job(name, "exit 1") }
}
