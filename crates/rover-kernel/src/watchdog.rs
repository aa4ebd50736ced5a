//! [`Watchdog`] – command-freshness safety supervisor.
//!
//! The actuator host calls [`Watchdog::check`] on every loop iteration and
//! [`Watchdog::accept`] whenever a new command is applied.  If no command has
//! been accepted within the timeout the watchdog stops the rover through its
//! [`Actuation`] driver.
//!
//! The stop is **edge-triggered**: it is issued once on the `Active → Stopped`
//! transition, and further checks while the link stays silent do nothing.
//! Time is passed in explicitly so callers (and tests) control the clock.

use std::time::{Duration, Instant};

use rover_hal::Actuation;
use rover_types::WatchdogState;
use tracing::{info, warn};

/// Fail-safe supervisor for the motion loop.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use rover_hal::{ActuationConfig, RoverDriver, SimBackend};
/// use rover_kernel::watchdog::Watchdog;
/// use rover_types::WatchdogState;
///
/// let mut backend = SimBackend::new();
/// let mut driver = RoverDriver::new(&mut backend, &ActuationConfig::default());
///
/// let start = Instant::now();
/// let mut wd = Watchdog::new(Duration::from_secs(1), start);
///
/// let later = start + Duration::from_millis(1100);
/// assert_eq!(wd.check(later, &mut driver), WatchdogState::Stopped);
/// ```
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    last_accepted_at: Instant,
    /// Whether any command has been accepted since start.
    fed: bool,
    state: WatchdogState,
}

impl Watchdog {
    /// Start in [`WatchdogState::Active`] with the deadline measured from
    /// `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_accepted_at: now,
            fed: false,
            state: WatchdogState::Active,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == WatchdogState::Stopped
    }

    /// Time since the last accepted command, `None` if nothing has been
    /// accepted yet.
    pub fn last_command_age(&self, now: Instant) -> Option<Duration> {
        self.fed
            .then(|| now.saturating_duration_since(self.last_accepted_at))
    }

    /// Record that a fresh command was applied at `now`.  Re-arms the
    /// watchdog if it had tripped.
    pub fn accept(&mut self, now: Instant) {
        self.last_accepted_at = now;
        self.fed = true;
        if self.state == WatchdogState::Stopped {
            info!("command link restored; watchdog re-armed");
            self.state = WatchdogState::Active;
        }
    }

    /// Evaluate the deadline at `now`.
    ///
    /// On the first check past the timeout this calls `driver.stop()` and
    /// moves to [`WatchdogState::Stopped`].  Every other call performs no I/O.
    pub fn check(&mut self, now: Instant, driver: &mut dyn Actuation) -> WatchdogState {
        if self.state == WatchdogState::Active {
            let silent_for = now.saturating_duration_since(self.last_accepted_at);
            if silent_for > self.timeout {
                warn!(
                    silent_ms = silent_for.as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "watchdog: no fresh command, stopping rover"
                );
                driver.stop();
                self.state = WatchdogState::Stopped;
            }
        }
        self.state
    }
}
