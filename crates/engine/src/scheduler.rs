// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer and scheduling management

use machina_core::EventEnvelope;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timer entry
#[derive(Debug, Clone)]
struct Timer {
    fires_at: Instant,
    event: String,
}

/// One-shot named timers for the interpreter loop.
///
/// Each timer carries the event name to enqueue when it fires. Setting a
/// timer under an existing id replaces its deadline.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<String, Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that enqueues `event` after `duration`.
    pub fn set_timer(&mut self, id: String, event: String, duration: Duration, now: Instant) {
        let fires_at = now + duration;
        self.timers.insert(id, Timer { fires_at, event });
    }

    /// Cancel a timer
    pub fn cancel_timer(&mut self, id: &str) {
        self.timers.remove(id);
    }

    /// Drain all timers that have fired, as event envelopes.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<EventEnvelope> {
        let fired: Vec<String> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.fires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut events = Vec::with_capacity(fired.len());
        for id in fired {
            if let Some(timer) = self.timers.remove(&id) {
                events.push(EventEnvelope::new(timer.event).with_source("timer"));
            }
        }
        events
    }

    /// Get the next timer fire time
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.fires_at).min()
    }

    /// Check if there are any pending timers
    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
