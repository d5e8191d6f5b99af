// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the coordination plane.
//!
//! Every surfaced failure carries a machine-readable [`ErrorKind`] tag;
//! transport layers map the tag onto their own status vocabulary.

use serde::{Deserialize, Serialize};

/// Machine-readable classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed request fields.
    InvalidInput,
    /// Missing or unacceptable token/session.
    Unauthorized,
    /// Unknown job/task/runner/file id.
    NotFound,
    /// Forbidden transition (e.g. delete a runner with active tasks).
    Conflict,
    /// External dependency unreachable.
    Unavailable,
    /// RPC or task deadline exceeded.
    Timeout,
}

crate::simple_display! {
    ErrorKind {
        InvalidInput => "invalid_input",
        Unauthorized => "unauthorized",
        NotFound => "not_found",
        Conflict => "conflict",
        Unavailable => "unavailable",
        Timeout => "timeout",
    }
}
