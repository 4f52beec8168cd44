// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use machina_core::{Clock, FakeClock};

#[test]
fn timer_lifecycle() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(
        "state-timeout".to_string(),
        "timeout(10)".to_string(),
        Duration::from_secs(10),
        clock.now(),
    );
    assert!(scheduler.has_timers());
    assert!(scheduler.next_deadline().is_some());

    // Timer hasn't fired yet
    clock.advance(Duration::from_secs(5));
    assert!(scheduler.fired_timers(clock.now()).is_empty());
    assert!(scheduler.has_timers());

    // Timer fires once, as an envelope carrying its event name
    clock.advance(Duration::from_secs(10));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "timeout(10)");
    assert_eq!(events[0].source.as_deref(), Some("timer"));
    assert!(!scheduler.has_timers());
}

#[test]
fn cancelled_timer_does_not_fire() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(
        "t".to_string(),
        "tick".to_string(),
        Duration::from_secs(10),
        clock.now(),
    );
    scheduler.cancel_timer("t");

    clock.advance(Duration::from_secs(15));
    assert!(scheduler.fired_timers(clock.now()).is_empty());
}

#[test]
fn multiple_timers_fire_independently() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(
        "fast".to_string(),
        "fast-event".to_string(),
        Duration::from_secs(5),
        clock.now(),
    );
    scheduler.set_timer(
        "slow".to_string(),
        "slow-event".to_string(),
        Duration::from_secs(20),
        clock.now(),
    );

    clock.advance(Duration::from_secs(6));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "fast-event");
    assert!(scheduler.has_timers(), "slow timer should still be pending");

    clock.advance(Duration::from_secs(15));
    let events = scheduler.fired_timers(clock.now());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "slow-event");
    assert!(!scheduler.has_timers());
}

#[test]
fn next_deadline_returns_earliest() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(
        "later".to_string(),
        "a".to_string(),
        Duration::from_secs(30),
        clock.now(),
    );
    scheduler.set_timer(
        "sooner".to_string(),
        "b".to_string(),
        Duration::from_secs(10),
        clock.now(),
    );

    let deadline = scheduler.next_deadline().unwrap();
    assert_eq!(deadline, clock.now() + Duration::from_secs(10));
}

#[test]
fn rearming_a_timer_resets_its_deadline() {
    let clock = FakeClock::new();
    let mut scheduler = Scheduler::new();

    scheduler.set_timer(
        "t".to_string(),
        "tick".to_string(),
        Duration::from_secs(10),
        clock.now(),
    );

    clock.advance(Duration::from_secs(2));
    scheduler.set_timer(
        "t".to_string(),
        "tick".to_string(),
        Duration::from_secs(20),
        clock.now(),
    );

    clock.advance(Duration::from_secs(9));
    assert!(
        scheduler.fired_timers(clock.now()).is_empty(),
        "old deadline should be overwritten"
    );

    clock.advance(Duration::from_secs(12));
    assert_eq!(scheduler.fired_timers(clock.now()).len(), 1);
}

#[test]
fn empty_scheduler_has_no_deadline() {
    let scheduler = Scheduler::new();
    assert!(!scheduler.has_timers());
    assert!(scheduler.next_deadline().is_none());
}
