// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for workspace specs.

pub use borg_core::{Clock, FakeClock, JobStatus, RunnerStatus, TaskStatus};
pub use borg_storage::{RegisterParams, Store, UpdateStatusParams};
pub use tempfile::TempDir;

/// A fresh store on a temp directory with a controllable clock.
pub fn open_store() -> (Store<FakeClock>, FakeClock, TempDir) {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let store = Store::open(dir.path(), clock.clone()).unwrap();
    (store, clock, dir)
}

/// Register a runner through the wire shape, as a real agent would.
pub fn register_wire_runner(
    store: &Store<FakeClock>,
    device_hex: &str,
    name: &str,
) -> borg_core::Runner {
    let req = borg_wire::RegisterRequest {
        name: name.to_string(),
        hostname: format!("{name}-host"),
        device_id: device_hex.to_string(),
        os: "linux".to_string(),
        architecture: "x86_64".to_string(),
        max_concurrent_tasks: 2,
        token: "deploy-token".to_string(),
        ..borg_wire::RegisterRequest::default()
    };
    store
        .register(RegisterParams {
            device_id: borg_core::DeviceId::new(req.device_id),
            name: req.name,
            hostname: req.hostname,
            os: req.os,
            architecture: req.architecture,
            max_concurrent_tasks: req.max_concurrent_tasks,
            labels: req.labels,
            token: req.token,
            resources: borg_core::ResourceSnapshot::default(),
            screen_monitoring_enabled: req.screen_monitoring_enabled,
            runtimes: req.runtimes,
        })
        .unwrap()
}

/// Build a NewJob from raw wire JSON, exactly as the create endpoint does.
pub fn new_job_from_wire(json: &str) -> borg_core::NewJob {
    let req: borg_wire::CreateJobRequest = serde_json::from_str(json).unwrap();
    req.into_new_job(None)
}
