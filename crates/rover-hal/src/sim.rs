//! In-process simulation backend for running the rover stack without GPIO.
//!
//! [`SimBackend`] hands out digital outputs and PWM channels that append every
//! write to a shared [`SimLog`].  Tests keep a clone of the log to assert on
//! exactly which signals the drivers produced; the `roverd` binary uses the
//! same backend on development machines.  The log is a ring: once it holds
//! [`DEFAULT_LOG_CAPACITY`] writes the oldest ones are dropped.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::gpio::{GpioBackend, PwmChannel};
//! use rover_hal::sim::{SimBackend, SimWrite};
//!
//! let mut backend = SimBackend::new();
//! let log = backend.log();
//!
//! let mut pwm = backend.pwm(12, 1000.0).expect("sim pwm never fails");
//! pwm.set_duty_cycle(40.0).unwrap();
//!
//! assert_eq!(log.writes(), vec![SimWrite::Duty { pin: 12, percent: 40.0 }]);
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use rover_types::RoverError;

use crate::gpio::{DigitalOutput, GpioBackend, PwmChannel};

// ────────────────────────────────────────────────────────────────────────────
// Write log
// ────────────────────────────────────────────────────────────────────────────

/// One recorded hardware write.
#[derive(Debug, Clone, PartialEq)]
pub enum SimWrite {
    Level { pin: u8, high: bool },
    Duty { pin: u8, percent: f32 },
}

/// Number of writes a [`SimLog`] keeps unless told otherwise.
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

#[derive(Debug)]
struct LogInner {
    writes: VecDeque<SimWrite>,
    capacity: usize,
}

/// Shared, bounded record of simulated writes.  Cloning shares the log.
#[derive(Debug, Clone)]
pub struct SimLog(Arc<Mutex<LogInner>>);

impl Default for SimLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl SimLog {
    /// Log keeping at most `capacity` writes (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self(Arc::new(Mutex::new(LogInner {
            writes: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            capacity,
        })))
    }

    fn inner(&self) -> MutexGuard<'_, LogInner> {
        // A panicking test thread must not hide the writes from other asserts.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, write: SimWrite) {
        let mut inner = self.inner();
        if inner.writes.len() == inner.capacity {
            inner.writes.pop_front();
        }
        inner.writes.push_back(write);
    }

    pub fn capacity(&self) -> usize {
        self.inner().capacity
    }

    /// Snapshot of every retained write, oldest first.
    pub fn writes(&self) -> Vec<SimWrite> {
        self.inner().writes.iter().cloned().collect()
    }

    /// Duty-cycle values written to `pin`, oldest first.
    pub fn duty_writes(&self, pin: u8) -> Vec<f32> {
        self.inner()
            .writes
            .iter()
            .filter_map(|w| match w {
                SimWrite::Duty { pin: p, percent } if *p == pin => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Most recent duty cycle written to `pin`.
    pub fn last_duty(&self, pin: u8) -> Option<f32> {
        self.duty_writes(pin).last().copied()
    }

    /// Most recent level written to `pin`.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.inner().writes.iter().rev().find_map(|w| match w {
            SimWrite::Level { pin: p, high } if *p == pin => Some(*high),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.inner().writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().writes.is_empty()
    }

    pub fn clear(&self) {
        self.inner().writes.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated handles
// ────────────────────────────────────────────────────────────────────────────

/// Simulated digital output.  Always succeeds.
pub struct SimOutput {
    pin: u8,
    log: SimLog,
}

impl DigitalOutput for SimOutput {
    fn set_high(&mut self) -> Result<(), RoverError> {
        self.log.push(SimWrite::Level {
            pin: self.pin,
            high: true,
        });
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), RoverError> {
        self.log.push(SimWrite::Level {
            pin: self.pin,
            high: false,
        });
        Ok(())
    }
}

/// Simulated PWM channel.  Always succeeds.
pub struct SimPwm {
    pin: u8,
    log: SimLog,
}

impl PwmChannel for SimPwm {
    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), RoverError> {
        self.log.push(SimWrite::Duty {
            pin: self.pin,
            percent,
        });
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend
// ────────────────────────────────────────────────────────────────────────────

/// Backend that records instead of driving pins.
///
/// Opening a handle does not itself produce a log entry, so the log reflects
/// only what the drivers actively wrote.  Pins registered with
/// [`with_failing_pin`][Self::with_failing_pin] refuse to open, which lets
/// tests exercise the inert-channel path.
#[derive(Default)]
pub struct SimBackend {
    log: SimLog,
    failing_pins: HashSet<u8>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose log keeps at most `capacity` writes.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            log: SimLog::with_capacity(capacity),
            failing_pins: HashSet::new(),
        }
    }

    /// Make every attempt to open `pin` fail with [`RoverError::HardwareInit`].
    pub fn with_failing_pin(mut self, pin: u8) -> Self {
        self.failing_pins.insert(pin);
        self
    }

    /// Handle to the shared write log.
    pub fn log(&self) -> SimLog {
        self.log.clone()
    }

    fn claim(&self, pin: u8) -> Result<(), RoverError> {
        if self.failing_pins.contains(&pin) {
            return Err(RoverError::HardwareInit {
                channel: format!("gpio{pin}"),
                details: "simulated init failure".to_string(),
            });
        }
        Ok(())
    }
}

impl GpioBackend for SimBackend {
    fn name(&self) -> &str {
        "sim"
    }

    fn output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, RoverError> {
        self.claim(pin)?;
        Ok(Box::new(SimOutput {
            pin,
            log: self.log.clone(),
        }))
    }

    fn pwm(&mut self, pin: u8, _frequency_hz: f64) -> Result<Box<dyn PwmChannel>, RoverError> {
        self.claim(pin)?;
        Ok(Box::new(SimPwm {
            pin,
            log: self.log.clone(),
        }))
    }
}
