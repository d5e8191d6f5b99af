// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner entity: a registered worker host.

use crate::consts::OFFLINE_THRESHOLD;
use crate::id::{DeviceId, RunnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored status of a runner.
///
/// "offline" is never persisted — it is derived from heartbeat age at read
/// time via [`Runner::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Idle,
    Busy,
    Offline,
}

crate::simple_display! {
    RunnerStatus {
        Idle => "idle",
        Busy => "busy",
        Offline => "offline",
    }
}

/// One GPU advertised by a runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// A named external interpreter/binary a runner can execute jobs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Host resource measurements advertised at registration and refreshed
/// via heartbeat piggyback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    #[serde(default)]
    pub cpu_cores: i32,
    #[serde(default)]
    pub cpu_model: String,
    #[serde(default)]
    pub cpu_frequency_mhz: i32,
    #[serde(default)]
    pub memory_gb: f64,
    #[serde(default)]
    pub disk_space_gb: f64,
    #[serde(default)]
    pub total_disk_space_gb: f64,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub gpu_info: Vec<GpuInfo>,
    #[serde(default)]
    pub public_ips: Vec<String>,
}

/// Screen-streaming knobs, operator-adjustable per runner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSettings {
    /// JPEG quality, 1–100.
    pub quality: u8,
    /// Frames per second, 0.5–10.
    pub fps: f64,
    pub screen_index: u32,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self { quality: 60, fps: 2.0, screen_index: 0 }
    }
}

impl ScreenSettings {
    /// Clamp operator input into the supported ranges.
    pub fn clamped(quality: i64, fps: f64, screen_index: i64) -> Self {
        Self {
            quality: quality.clamp(1, 100) as u8,
            fps: fps.clamp(0.5, 10.0),
            screen_index: screen_index.max(0) as u32,
        }
    }
}

/// A registered worker host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    pub id: RunnerId,
    /// Stable hardware identity; unique across live and soft-deleted rows.
    pub device_id: DeviceId,
    pub name: String,
    pub hostname: String,
    pub os: String,
    pub architecture: String,
    pub status: RunnerStatus,
    pub max_concurrent_tasks: i32,
    #[serde(default)]
    pub active_tasks: i32,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub resources: ResourceSnapshot,
    #[serde(default)]
    pub screen_monitoring_enabled: bool,
    #[serde(default)]
    pub screen_settings: ScreenSettings,
    #[serde(default)]
    pub runtimes: Vec<RuntimeSpec>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Runner {
    /// Status as seen by clients: overridden to Offline when the last
    /// heartbeat is older than the threshold. The stored row is untouched.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RunnerStatus {
        let age = now.signed_duration_since(self.last_heartbeat);
        if age.to_std().map(|d| d > OFFLINE_THRESHOLD).unwrap_or(false) {
            RunnerStatus::Offline
        } else {
            self.status
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

crate::builder! {
    pub struct RunnerBuilder => Runner {
        into {
            id: RunnerId = "runner-1",
            device_id: DeviceId = "a".repeat(64),
            name: String = "test-runner",
            hostname: String = "host-1",
            os: String = "linux",
            architecture: String = "x86_64",
        }
        set {
            status: RunnerStatus = RunnerStatus::Idle,
            max_concurrent_tasks: i32 = 1,
            active_tasks: i32 = 0,
            labels: HashMap<String, String> = HashMap::new(),
            resources: ResourceSnapshot = ResourceSnapshot::default(),
            screen_monitoring_enabled: bool = false,
            screen_settings: ScreenSettings = ScreenSettings::default(),
            runtimes: Vec<RuntimeSpec> = Vec::new(),
        }
        option {
            deleted_at: DateTime<Utc> = None,
        }
        computed {
            registered_at: DateTime<Utc> = Utc::now(),
            last_heartbeat: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
