// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn os_version_carries_architecture_tag() {
    let v = os_version();
    assert!(v.contains(std::env::consts::ARCH), "missing arch tag: {v}");
}

#[test]
fn cpu_cores_is_nonnegative() {
    assert!(cpu_cores() >= 0);
}

#[test]
fn disk_space_is_best_effort() {
    let dir = tempfile::tempdir().unwrap();
    let (free, total) = disk_space(dir.path());
    assert!(free >= 0.0);
    assert!(free <= total || total == 0.0);
}

#[test]
fn memory_is_best_effort() {
    assert!(memory_gb() >= 0.0);
}
