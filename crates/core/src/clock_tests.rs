// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_epoch_advances() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(b >= a);
}

#[test]
fn fake_clock_advance() {
    let clock = FakeClock::new();
    let start_instant = clock.now();
    let start_ms = clock.epoch_ms();

    clock.advance(Duration::from_millis(1500));

    assert_eq!(clock.now() - start_instant, Duration::from_millis(1500));
    assert_eq!(clock.epoch_ms(), start_ms + 1500);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42_000);
    assert_eq!(clock.epoch_ms(), 42_000);
}

#[test]
fn fake_clock_utc_now_tracks_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.utc_now().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.epoch_ms(), clock.epoch_ms());
}
