//! Motor sub-driver: direction lines plus a duty-cycle magnitude per channel.
//!
//! Two wirings are supported behind the same [`MotorDriver`] API:
//!
//! - **Two-channel** – an H-bridge per side (`in1`, `in2`, `pwm`).  Forward is
//!   `in1` high / `in2` low.  For six-wheel chassis the three motors of a side
//!   are wired in parallel.
//! - **Single-channel** – one driver with a `dir` pin and a `pwm` pin
//!   (PWM+DIR boards).  Forward is `dir` high.
//!
//! A channel that fails to open is logged and left inert; the remaining
//! channels keep working.

use rover_types::{DriveOutput, RoverError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::gpio::{DigitalOutput, GpioBackend, PwmChannel};

// ────────────────────────────────────────────────────────────────────────────
// Pin configuration
// ────────────────────────────────────────────────────────────────────────────

/// H-bridge pins for one side of a two-channel chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidePins {
    pub in1: u8,
    pub in2: u8,
    pub pwm: u8,
}

/// Motor wiring, BCM pin numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum MotorPins {
    TwoChannel { left: SidePins, right: SidePins },
    SingleChannel { dir: u8, pwm: u8 },
}

impl Default for MotorPins {
    fn default() -> Self {
        MotorPins::TwoChannel {
            left: SidePins {
                in1: 17,
                in2: 27,
                pwm: 12,
            },
            right: SidePins {
                in1: 5,
                in2: 6,
                pwm: 13,
            },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// One motor channel
// ────────────────────────────────────────────────────────────────────────────

enum Bridge {
    Dual {
        in1: Box<dyn DigitalOutput>,
        in2: Box<dyn DigitalOutput>,
    },
    Single {
        dir: Box<dyn DigitalOutput>,
    },
}

struct MotorChannel {
    label: &'static str,
    bridge: Bridge,
    pwm: Box<dyn PwmChannel>,
}

impl MotorChannel {
    fn open_dual(
        backend: &mut dyn GpioBackend,
        label: &'static str,
        pins: SidePins,
        frequency_hz: f64,
    ) -> Result<Self, RoverError> {
        let in1 = backend.output(pins.in1)?;
        let in2 = backend.output(pins.in2)?;
        let pwm = backend.pwm(pins.pwm, frequency_hz)?;
        Ok(Self {
            label,
            bridge: Bridge::Dual { in1, in2 },
            pwm,
        })
    }

    fn open_single(
        backend: &mut dyn GpioBackend,
        dir: u8,
        pwm: u8,
        frequency_hz: f64,
    ) -> Result<Self, RoverError> {
        let dir = backend.output(dir)?;
        let pwm = backend.pwm(pwm, frequency_hz)?;
        Ok(Self {
            label: "drive",
            bridge: Bridge::Single { dir },
            pwm,
        })
    }

    /// `speed` must already be clamped.
    fn drive(&mut self, speed: i32) -> Result<(), RoverError> {
        let forward = speed >= 0;
        match &mut self.bridge {
            Bridge::Dual { in1, in2 } => {
                in1.set_level(forward)?;
                in2.set_level(!forward)?;
            }
            Bridge::Single { dir } => dir.set_level(forward)?,
        }
        self.pwm.set_duty_cycle(speed.unsigned_abs() as f32)
    }

    fn stop(&mut self) -> Result<(), RoverError> {
        self.pwm.set_duty_cycle(0.0)?;
        match &mut self.bridge {
            Bridge::Dual { in1, in2 } => {
                in1.set_low()?;
                in2.set_low()
            }
            Bridge::Single { dir } => dir.set_low(),
        }
    }
}

fn open_or_inert(
    label: &'static str,
    opened: Result<MotorChannel, RoverError>,
) -> Option<MotorChannel> {
    match opened {
        Ok(channel) => Some(channel),
        Err(e) => {
            error!(channel = label, error = %e, "motor channel failed to initialise; leaving it inert");
            None
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MotorDriver
// ────────────────────────────────────────────────────────────────────────────

enum Layout {
    TwoChannel {
        left: Option<MotorChannel>,
        right: Option<MotorChannel>,
    },
    SingleChannel {
        drive: Option<MotorChannel>,
    },
}

/// Drives the rover's motors from a [`DriveOutput`].
///
/// Speeds are clamped to `[-max_speed, max_speed]` before any write.
pub struct MotorDriver {
    layout: Layout,
    max_speed: i32,
}

impl MotorDriver {
    /// Open every motor channel described by `pins`.
    ///
    /// Never fails: channels whose pins cannot be claimed are logged at error
    /// severity and become permanent no-ops.
    pub fn new(
        backend: &mut dyn GpioBackend,
        pins: &MotorPins,
        frequency_hz: f64,
        max_speed: i32,
    ) -> Self {
        let layout = match *pins {
            MotorPins::TwoChannel { left, right } => Layout::TwoChannel {
                left: open_or_inert(
                    "left",
                    MotorChannel::open_dual(backend, "left", left, frequency_hz),
                ),
                right: open_or_inert(
                    "right",
                    MotorChannel::open_dual(backend, "right", right, frequency_hz),
                ),
            },
            MotorPins::SingleChannel { dir, pwm } => Layout::SingleChannel {
                drive: open_or_inert(
                    "drive",
                    MotorChannel::open_single(backend, dir, pwm, frequency_hz),
                ),
            },
        };
        let driver = Self {
            layout,
            max_speed: max_speed.clamp(0, 100),
        };
        info!(
            backend = backend.name(),
            active_channels = driver.active_channels(),
            max_speed = driver.max_speed,
            "motor driver initialised"
        );
        driver
    }

    pub fn max_speed(&self) -> i32 {
        self.max_speed
    }

    /// Number of channels that initialised successfully.
    pub fn active_channels(&self) -> usize {
        match &self.layout {
            Layout::TwoChannel { left, right } => {
                usize::from(left.is_some()) + usize::from(right.is_some())
            }
            Layout::SingleChannel { drive } => usize::from(drive.is_some()),
        }
    }

    /// Apply `output` to the wired motors.
    ///
    /// A differential output on a single-channel chassis drives the mean of
    /// both sides; a unified output on a two-channel chassis drives both sides
    /// at the same speed.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoverError::HardwareFault`] raised by a channel.
    /// The remaining channels are still written.
    pub fn apply(&mut self, output: &DriveOutput) -> Result<(), RoverError> {
        let (left, right) = match *output {
            DriveOutput::Stop => return self.stop(),
            DriveOutput::Differential { left, right } => (left, right),
            DriveOutput::Unified { speed, .. } => (speed, speed),
        };
        self.set_speed(left, right)
    }

    /// Set per-side speeds, clamped to the configured maximum.
    pub fn set_speed(&mut self, left: i32, right: i32) -> Result<(), RoverError> {
        let max = self.max_speed;
        let left = left.clamp(-max, max);
        let right = right.clamp(-max, max);
        debug!(left, right, "motors set");
        let mut result = Ok(());
        match &mut self.layout {
            Layout::TwoChannel { left: l, right: r } => {
                for (channel, speed) in [(l, left), (r, right)] {
                    if let Some(channel) = channel {
                        keep_first(&mut result, channel.label, channel.drive(speed));
                    }
                }
            }
            Layout::SingleChannel { drive } => {
                if let Some(channel) = drive {
                    keep_first(&mut result, channel.label, channel.drive((left + right) / 2));
                }
            }
        }
        result
    }

    /// Duty 0 and direction lines low on every channel.
    pub fn stop(&mut self) -> Result<(), RoverError> {
        debug!("motors stopped");
        let mut result = Ok(());
        let channels: Vec<&mut MotorChannel> = match &mut self.layout {
            Layout::TwoChannel { left, right } => {
                left.iter_mut().chain(right.iter_mut()).collect()
            }
            Layout::SingleChannel { drive } => drive.iter_mut().collect(),
        };
        for channel in channels {
            keep_first(&mut result, channel.label, channel.stop());
        }
        result
    }
}

fn keep_first(result: &mut Result<(), RoverError>, label: &str, outcome: Result<(), RoverError>) {
    if let Err(e) = outcome {
        warn!(channel = label, error = %e, "motor write failed");
        if result.is_ok() {
            *result = Err(e);
        }
    }
}
