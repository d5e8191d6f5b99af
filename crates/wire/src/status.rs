// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task status updates, log chunks, and screen-stream status shapes.

use serde::{Deserialize, Serialize};

/// Serde adapter: raw bytes as base64 strings on the wire.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        B64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// Map the wire exit-code sentinel onto the internal option.
///
/// `-1` means "no exit code available" and is stored as `None`.
pub fn normalize_exit_code(wire: Option<i32>) -> Option<i32> {
    match wire {
        Some(-1) | None => None,
        other => other,
    }
}

/// Map the internal option back to the wire sentinel.
pub fn wire_exit_code(code: Option<i32>) -> i32 {
    code.unwrap_or(-1)
}

/// `POST /api/v1/tasks/:id/status` body, also the `task_status` envelope
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// Task id; carried in the body on the WS path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub task_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default, with = "base64_bytes")]
    pub stdout: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub stderr: Vec<u8>,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
}

/// Standalone streamed log chunk (`log_chunk` envelope payload).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogChunk {
    pub task_id: String,
    #[serde(default)]
    pub level: String,
    pub message: String,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
}

/// HTTP fallback frame upload (`POST /runners/:id/screen/frame`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenFramePost {
    /// Base64-encoded JPEG.
    pub frame: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// `GET /runners/:id/screen/status` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenStatus {
    pub streaming: bool,
    pub viewer_count: usize,
    pub quality: u8,
    pub fps: f64,
    pub screen_index: u32,
}
