//! `rover-hal` – Actuation Driver
//!
//! Owns the rover's physical outputs and turns clamped numeric targets into
//! hardware signals.  Nothing above this crate touches a pin directly.
//!
//! # Modules
//!
//! - [`gpio`] – the [`DigitalOutput`][gpio::DigitalOutput] and
//!   [`PwmChannel`][gpio::PwmChannel] capability traits plus the
//!   [`GpioBackend`][gpio::GpioBackend] factory that hands them out.
//! - [`sim`] – [`SimBackend`][sim::SimBackend]: an in-process backend that
//!   records every write, for tests and for hosts without GPIO.
//! - `rpi` – Raspberry Pi backend built on `rppal` (feature `rpi`, Linux only).
//! - [`motor`] – [`MotorDriver`][motor::MotorDriver]: direction + duty-cycle
//!   control for two-channel (left/right) or single-channel motor wiring.
//! - [`servo`] – [`ServoController`][servo::ServoController]: angle to duty
//!   mapping with anti-jitter suppression and detach.
//! - [`driver`] – the [`Actuation`][driver::Actuation] contract and the
//!   composed [`RoverDriver`][driver::RoverDriver].

pub mod driver;
pub mod gpio;
pub mod motor;
#[cfg(all(feature = "rpi", target_os = "linux"))]
pub mod rpi;
pub mod servo;
pub mod sim;

pub use driver::{Actuation, ActuationConfig, RoverDriver};
pub use gpio::{DigitalOutput, GpioBackend, HardwareKind, PwmChannel, open_backend};
pub use motor::{MotorDriver, MotorPins, SidePins};
pub use servo::ServoController;
pub use sim::{SimBackend, SimLog, SimWrite};
