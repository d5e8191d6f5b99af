// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `{type, data}` envelope carried on every JSON WebSocket frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message kind tags.
///
/// runner → server: `heartbeat`, `task_status`, `log_chunk`.
/// server → runner: `task`, `cancel`, `pong`.
/// server → dashboard: domain-specific tags (`job_update`, `runner_update`, …).
pub mod kind {
    pub const HEARTBEAT: &str = "heartbeat";
    pub const TASK_STATUS: &str = "task_status";
    pub const LOG_CHUNK: &str = "log_chunk";
    pub const TASK: &str = "task";
    pub const CANCEL: &str = "cancel";
    pub const PONG: &str = "pong";

    pub const JOB_UPDATE: &str = "job_update";
    pub const TASK_UPDATE: &str = "task_update";
    pub const RUNNER_UPDATE: &str = "runner_update";
}

/// Errors from envelope encode/decode.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unexpected message type {got:?}, wanted {wanted:?}")]
    WrongKind { wanted: &'static str, got: String },
}

/// A typed JSON message: `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Build an envelope from a serializable payload.
    pub fn new<T: Serialize>(kind: &str, data: &T) -> Result<Self, EnvelopeError> {
        Ok(Self { kind: kind.to_string(), data: serde_json::to_value(data)? })
    }

    /// An envelope with no payload (`pong`, `cancel` acks).
    pub fn bare(kind: &str) -> Self {
        Self { kind: kind.to_string(), data: serde_json::Value::Null }
    }

    /// Parse an envelope from a raw text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize to the text form sent on the socket.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the payload, verifying the kind tag first.
    pub fn decode<T: serde::de::DeserializeOwned>(
        &self,
        wanted: &'static str,
    ) -> Result<T, EnvelopeError> {
        if self.kind != wanted {
            return Err(EnvelopeError::WrongKind { wanted, got: self.kind.clone() });
        }
        Ok(serde_json::from_value(self.data.clone())?)
    }
}
