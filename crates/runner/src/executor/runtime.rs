// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Download-and-cache for pluggable runtimes.
//!
//! A runtime with a URL is fetched once into `work/.runtimes/<name>` and
//! reused on later runs. Concurrent first use of the same runtime is
//! serialized with a per-name lock so two tasks never race to create the
//! same file.

use borg_core::RuntimeSpec;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::ExecError;

/// Cache directory name under the work dir.
const RUNTIMES_DIR: &str = ".runtimes";

/// Runtime executable resolver with per-name serialization.
pub struct RuntimeCache {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RuntimeCache {
    pub fn new(work_dir: &Path) -> Self {
        Self { dir: work_dir.join(RUNTIMES_DIR), locks: Mutex::new(HashMap::new()) }
    }

    /// Path the runtime will be cached at.
    pub fn cached_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Resolve a runtime to an executable path, downloading on first use.
    pub async fn resolve(&self, spec: &RuntimeSpec) -> Result<PathBuf, ExecError> {
        if let Some(url) = spec.url.as_deref().filter(|u| !u.is_empty()) {
            let lock = self.lock_for(&spec.name);
            let _guard = lock.lock().await;

            let target = self.cached_path(&spec.name);
            if !target.exists() {
                self.download(url, &target).await?;
                info!(runtime = %spec.name, path = %target.display(), "runtime cached");
            }
            super::make_executable(&target)?;
            return Ok(target);
        }

        match spec.path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Err(ExecError::UnknownRuntime(spec.name.clone())),
        }
    }

    async fn download(&self, url: &str, target: &Path) -> Result<(), ExecError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(ExecError::Io)?;

        let response = reqwest::get(url)
            .await
            .map_err(|e| ExecError::RuntimeFetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExecError::RuntimeFetch(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExecError::RuntimeFetch(e.to_string()))?;

        // Write to a temp name then rename so a crash never leaves a
        // half-written executable at the cached path.
        let tmp = target.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await.map_err(ExecError::Io)?;
        tokio::fs::rename(&tmp, target).await.map_err(ExecError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
