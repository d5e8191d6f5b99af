// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration request/response shapes.

use borg_core::{GpuInfo, RuntimeSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `POST /api/v1/runners/register` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    /// Stable hardware identity; empty on legacy agents (hostname fallback).
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub max_concurrent_tasks: i32,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub token: String,
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
    #[serde(default)]
    pub screen_monitoring_enabled: bool,
    #[serde(default)]
    pub runtimes: Vec<RuntimeSpec>,
}

/// Registration result: the server-side runner id plus the recommended
/// heartbeat period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub runner_id: String,
    pub name: String,
    pub heartbeat_interval_seconds: u64,
}
