//! `rover-kernel` – Motion & Safety
//!
//! Pure decision logic of the rover: what the actuators should do for a given
//! command, whether a command is fresh enough to apply, and when to stop the
//! rover because the command link went silent.  Nothing here touches the
//! network; hardware is only reached through the [`rover_hal::Actuation`]
//! contract.
//!
//! # Modules
//!
//! - [`kinematics`] – [`Kinematics`][kinematics::Kinematics]:
//!   maps `(turn, throttle, speed_cap)` to a [`MotionPlan`][rover_types::MotionPlan]
//!   with deadzone, speed capping and counter-steered 4-wheel steering.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]:
//!   edge-triggered fail-safe that stops the rover once when commands stop
//!   arriving.
//! - [`sequence`] – [`SequenceGate`][sequence::SequenceGate]:
//!   discards commands whose sequence marker is not strictly newer.

pub mod kinematics;
pub mod sequence;
pub mod watchdog;

pub use kinematics::{DriveMode, Kinematics, KinematicsConfig};
pub use sequence::SequenceGate;
pub use watchdog::Watchdog;
