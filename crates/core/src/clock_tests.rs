// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now_utc();
    let b = clock.now_utc();
    assert!(b >= a);
}

#[test]
fn fake_clock_advance() {
    let clock = FakeClock::new();
    let start = clock.now_utc();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now_utc() - start, chrono::Duration::seconds(90));
}

#[test]
fn fake_clock_epoch_ms_tracks_advance() {
    let clock = FakeClock::new();
    let before = clock.epoch_ms();
    clock.advance(Duration::from_millis(1500));
    assert_eq!(clock.epoch_ms(), before + 1500);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now_utc(), other.now_utc());
}
