// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry specs: device identity, offline derivation, soft delete.

use crate::prelude::*;
use borg_storage::HeartbeatParams;
use std::time::Duration;

#[test]
fn offline_is_derived_and_reversible() {
    let (store, clock, _dir) = open_store();
    let runner = register_wire_runner(&store, &"1".repeat(64), "r1");

    // last_heartbeat = now − 180s, stored status idle.
    clock.advance(Duration::from_secs(180));

    let row = store.get_runner(&runner.id).unwrap();
    assert_eq!(row.status, RunnerStatus::Idle);
    assert_eq!(row.effective_status(clock.now_utc()), RunnerStatus::Offline);

    // A follow-up heartbeat flips it back without any stored "offline".
    store
        .heartbeat(
            &runner.id,
            HeartbeatParams {
                status: RunnerStatus::Idle,
                active_tasks: 0,
                resources: None,
            },
        )
        .unwrap();
    let row = store.get_runner(&runner.id).unwrap();
    assert_eq!(row.effective_status(clock.now_utc()), RunnerStatus::Idle);
}

#[test]
fn device_identity_survives_rename_and_reregistration() {
    let (store, _, _dir) = open_store();
    let device = "2".repeat(64);

    let registered = register_wire_runner(&store, &device, "a");
    store.rename_runner(&registered.id, "b").unwrap();

    let re_registered = register_wire_runner(&store, &device, "c");

    assert_eq!(re_registered.id, registered.id);
    assert_eq!(re_registered.name, "c");
    assert_eq!(re_registered.device_id.as_str(), device);
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn repeated_registration_is_idempotent() {
    let (store, _, _dir) = open_store();
    let device = "3".repeat(64);

    let mut last_id = None;
    for _ in 0..5 {
        let runner = register_wire_runner(&store, &device, "same");
        if let Some(previous) = &last_id {
            assert_eq!(&runner.id, previous);
        }
        last_id = Some(runner.id);
    }
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn soft_delete_then_register_revives() {
    let (store, _, _dir) = open_store();
    let device = "4".repeat(64);
    let runner = register_wire_runner(&store, &device, "r1");

    store.delete_runner(&runner.id).unwrap();
    assert!(store.list_runners().is_empty());

    let revived = register_wire_runner(&store, &device, "r1");
    assert_eq!(revived.id, runner.id);
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn registry_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let device = "5".repeat(64);

    let original_id = {
        let store = Store::open(dir.path(), clock.clone()).unwrap();
        let runner = register_wire_runner(&store, &device, "persisted");
        runner.id
    };

    let store = Store::open(dir.path(), clock).unwrap();
    let revived = register_wire_runner(&store, &device, "persisted");
    assert_eq!(revived.id, original_id);
}
