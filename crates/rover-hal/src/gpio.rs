//! Capability interfaces for the two kinds of signal the rover drives.
//!
//! Motor and servo drivers never talk to a GPIO library directly; they ask a
//! [`GpioBackend`] for [`DigitalOutput`] and [`PwmChannel`] handles at
//! construction time and own those handles for the rest of the process.  The
//! backend is chosen once from configuration (see [`open_backend`]).

use std::fmt;
use std::str::FromStr;

use rover_types::RoverError;
use serde::{Deserialize, Serialize};

/// A single push-pull output line (motor direction pins).
pub trait DigitalOutput: Send {
    /// Drive the line high.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the write fails.
    fn set_high(&mut self) -> Result<(), RoverError>;

    /// Drive the line low.
    fn set_low(&mut self) -> Result<(), RoverError>;

    fn set_level(&mut self, high: bool) -> Result<(), RoverError> {
        if high { self.set_high() } else { self.set_low() }
    }
}

/// A PWM output whose frequency is fixed when it is opened.
pub trait PwmChannel: Send {
    /// Set the duty cycle in percent, `0.0..=100.0`.  A duty of `0.0`
    /// silences the signal.
    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), RoverError>;
}

/// Factory for hardware handles.
///
/// Opening a handle may fail (pin busy, no permission, no GPIO chip); callers
/// treat that as a per-channel [`RoverError::HardwareInit`].
pub trait GpioBackend {
    /// Short backend name for logs, e.g. `"sim"`.
    fn name(&self) -> &str;

    /// Claim `pin` as a digital output, initially low.
    fn output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, RoverError>;

    /// Claim `pin` as a PWM output at `frequency_hz`, initially at 0 % duty.
    fn pwm(&mut self, pin: u8, frequency_hz: f64) -> Result<Box<dyn PwmChannel>, RoverError>;
}

/// Which [`GpioBackend`] to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareKind {
    /// Recording backend, no physical I/O.
    #[default]
    Sim,
    /// Raspberry Pi GPIO header.
    Rpi,
}

impl fmt::Display for HardwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareKind::Sim => write!(f, "sim"),
            HardwareKind::Rpi => write!(f, "rpi"),
        }
    }
}

impl FromStr for HardwareKind {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sim" => Ok(HardwareKind::Sim),
            "rpi" => Ok(HardwareKind::Rpi),
            other => Err(RoverError::Config(format!("unknown hardware backend '{other}'"))),
        }
    }
}

/// Construct the backend selected by `kind`.
///
/// # Errors
///
/// Returns [`RoverError::HardwareInit`] when the Raspberry Pi GPIO chip
/// cannot be opened, and [`RoverError::Config`] when `rpi` is requested from a
/// build without the `rpi` feature.
pub fn open_backend(kind: HardwareKind) -> Result<Box<dyn GpioBackend>, RoverError> {
    match kind {
        HardwareKind::Sim => Ok(Box::new(crate::sim::SimBackend::new())),
        #[cfg(all(feature = "rpi", target_os = "linux"))]
        HardwareKind::Rpi => Ok(Box::new(crate::rpi::RpiBackend::new()?)),
        #[cfg(not(all(feature = "rpi", target_os = "linux")))]
        HardwareKind::Rpi => Err(RoverError::Config(
            "this build has no Raspberry Pi support; rebuild with --features rpi".to_string(),
        )),
    }
}
