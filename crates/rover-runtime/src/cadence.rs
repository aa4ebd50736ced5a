//! Adaptive polling cadence.
//!
//! Poll fast while the operator is actively driving, slow otherwise to save
//! Wi-Fi airtime and battery.  Cadence only affects latency, never safety:
//! the watchdog runs on every iteration regardless.

use std::time::{Duration, Instant};

/// Picks the sleep between loop iterations.
#[derive(Debug, Clone)]
pub struct Cadence {
    fast: Duration,
    slow: Duration,
    activity_window: Duration,
    last_activity: Instant,
}

impl Cadence {
    /// The loop starts in fast mode: `start` counts as activity so a freshly
    /// started host picks up the first command quickly.
    pub fn new(fast: Duration, slow: Duration, activity_window: Duration, start: Instant) -> Self {
        Self {
            fast,
            slow,
            activity_window,
            last_activity: start,
        }
    }

    /// Note that a non-idle command was applied at `now`.
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_active(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) < self.activity_window
    }

    /// Sleep duration for the iteration ending at `now`.
    pub fn next_delay(&self, now: Instant) -> Duration {
        if self.is_active(now) { self.fast } else { self.slow }
    }
}
