// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner configuration: YAML file, environment fallbacks, CLI flags.
//!
//! Precedence: flags > environment > file > defaults.

use borg_core::RuntimeSpec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot parse config {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

/// Screen-capture related settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreenConfig {
    pub enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self { enabled: false, max_width: 1280, max_height: 800 }
    }
}

/// Full agent configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Mothership base address, e.g. `http://coordinator:8080`.
    pub mothership_addr: String,
    /// Display name; defaults to the hostname when empty.
    pub name: String,
    pub token: String,
    pub work_dir: PathBuf,
    pub heartbeat_interval_seconds: u64,
    pub max_concurrent_tasks: i32,
    pub labels: HashMap<String, String>,
    pub screen: ScreenConfig,
    pub runtimes: Vec<RuntimeSpec>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mothership_addr: "http://localhost:8080".to_string(),
            name: String::new(),
            token: String::new(),
            work_dir: PathBuf::from("./work"),
            heartbeat_interval_seconds: 30,
            max_concurrent_tasks: 1,
            labels: HashMap::new(),
            screen: ScreenConfig::default(),
            runtimes: Vec::new(),
        }
    }
}

/// Flag-level overrides collected by clap.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mothership_addr: Option<String>,
    pub name: Option<String>,
    pub token: Option<String>,
    pub work_dir: Option<PathBuf>,
}

impl RunnerConfig {
    /// Load from YAML, then apply env fallbacks, then flag overrides.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|source| ConfigError::Read { path: p.to_path_buf(), source })?;
                serde_yaml::from_str(&text)
                    .map_err(|source| ConfigError::Parse { path: p.to_path_buf(), source })?
            }
            None => Self::default(),
        };

        config.apply_env();

        if let Some(addr) = overrides.mothership_addr {
            config.mothership_addr = addr;
        }
        if let Some(name) = overrides.name {
            config.name = name;
        }
        if let Some(token) = overrides.token {
            config.token = token;
        }
        if let Some(work_dir) = overrides.work_dir {
            config.work_dir = work_dir;
        }

        config.max_concurrent_tasks = config.max_concurrent_tasks.max(1);
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(addr) = env_value("MOTHERSHIP_ADDR") {
            self.mothership_addr = addr;
        }
        if let Some(name) = env_value("RUNNER_NAME") {
            self.name = name;
        }
        if let Some(token) = env_value("RUNNER_TOKEN") {
            self.token = token;
        }
        if let Some(dir) = env_value("WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
    }

    /// Name with hostname fallback.
    pub fn effective_name(&self, hostname: &str) -> String {
        if self.name.is_empty() {
            hostname.to_string()
        } else {
            self.name.clone()
        }
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
