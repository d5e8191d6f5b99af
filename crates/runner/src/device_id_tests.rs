// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn probe(tag: &'static str, value: &str) -> Box<dyn IdentifierProbe> {
    Box::new(FakeProbe { tag, value: Some(value.to_string()) })
}

fn empty_probe(tag: &'static str) -> Box<dyn IdentifierProbe> {
    Box::new(FakeProbe { tag, value: None })
}

#[test]
fn derive_is_deterministic() {
    let probes = vec![probe("cpu", "Apple M3"), probe("mac", "aa:bb:cc:dd:ee:ff")];
    let a = derive(&probes).unwrap();
    let b = derive(&probes).unwrap();

    assert_eq!(a, b);
    assert!(a.is_canonical());
}

#[test]
fn derive_hashes_tagged_joined_identifiers() {
    // sha256("cpu:Apple M3|mac:aa:bb:cc:dd:ee:ff") — the pure step.
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"cpu:Apple M3|mac:aa:bb:cc:dd:ee:ff");
    let expected = format!("{:x}", hasher.finalize());

    let probes = vec![probe("cpu", "Apple M3"), probe("mac", "aa:bb:cc:dd:ee:ff")];
    assert_eq!(derive(&probes).unwrap().as_str(), expected);
}

#[test]
fn failed_probes_are_skipped() {
    let with_gaps = vec![
        empty_probe("cpu"),
        probe("uuid", "1234-5678"),
        empty_probe("serial"),
    ];
    let only_uuid = vec![probe("uuid", "1234-5678")];
    assert_eq!(derive(&with_gaps).unwrap(), derive(&only_uuid).unwrap());
}

#[test]
fn zero_identifiers_is_unavailable() {
    let probes = vec![empty_probe("cpu"), empty_probe("mac")];
    assert!(matches!(derive(&probes), Err(DeviceIdError::Unavailable)));
}

#[test]
fn identifier_order_matters() {
    let ab = vec![probe("cpu", "a"), probe("mac", "b")];
    let ba = vec![probe("mac", "b"), probe("cpu", "a")];
    assert_ne!(derive(&ab).unwrap(), derive(&ba).unwrap());
}

#[test]
fn cache_round_trip() {
    let dir = tempdir().unwrap();
    let probes = vec![probe("cpu", "one")];

    let first = load_or_derive(dir.path(), &probes).unwrap();
    assert!(cache_path(dir.path()).exists());

    // Later runs read the cache even when probes change.
    let changed = vec![probe("cpu", "two")];
    let second = load_or_derive(dir.path(), &changed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn garbage_cache_is_rederived() {
    let dir = tempdir().unwrap();
    std::fs::write(cache_path(dir.path()), "not-a-hex-id").unwrap();

    let probes = vec![probe("cpu", "one")];
    let id = load_or_derive(dir.path(), &probes).unwrap();
    assert!(id.is_canonical());

    // And the cache was repaired.
    let cached = std::fs::read_to_string(cache_path(dir.path())).unwrap();
    assert_eq!(cached, id.as_str());
}
