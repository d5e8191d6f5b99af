// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mothership configuration: TOML file with environment fallbacks.
//!
//! Precedence: CLI flags > environment > config file > defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("cannot parse config {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MothershipConfig {
    /// Address the HTTP/WS front end binds.
    pub listen_addr: String,
    /// State + blob directory.
    pub data_dir: PathBuf,
    /// Default operator seeded on first start.
    pub admin_username: String,
    pub admin_password: String,
    /// Log file directory; empty disables file logging.
    pub log_dir: PathBuf,
}

impl Default for MothershipConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_dir: default_data_dir(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            log_dir: PathBuf::new(),
        }
    }
}

/// `~/.local/share/borg` (platform equivalent), falling back to a
/// relative directory when no home exists (containers).
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("borg"))
        .unwrap_or_else(|| PathBuf::from("./borg-data"))
}

impl MothershipConfig {
    /// Load from a TOML file, then apply environment fallbacks.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|source| ConfigError::Read { path: p.to_path_buf(), source })?;
                toml::from_str(&text)
                    .map_err(|source| ConfigError::Parse { path: p.to_path_buf(), source })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("BORG_LISTEN_ADDR") {
            if !addr.is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(dir) = std::env::var("BORG_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
