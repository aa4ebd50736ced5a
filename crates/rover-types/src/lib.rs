use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic staleness marker attached to every issued [`Command`].
///
/// The command source stamps commands with a strictly increasing number (the
/// dashboard backend uses a UNIX timestamp, hence `f64`).  The actuator host
/// only applies a command whose marker is strictly greater than the last one
/// it processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(pub f64);

impl Sequence {
    /// Marker held by a host that has not processed anything yet.
    pub const ZERO: Sequence = Sequence(0.0);

    /// `true` when `self` is strictly newer than `other`.  `NaN` is never newer.
    pub fn is_newer_than(self, other: Sequence) -> bool {
        self.0 > other.0
    }
}

impl From<u64> for Sequence {
    fn from(value: u64) -> Self {
        Sequence(value as f64)
    }
}

impl From<i32> for Sequence {
    fn from(value: i32) -> Self {
        Sequence(f64::from(value))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-level joystick command produced by the command source.
///
/// Field ranges are advisory: out-of-range values are clamped downstream and
/// never rejected.  The short names used by the dashboard backend
/// (`x`, `y`, `speed`, `ts`, `servos`) are accepted on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Turn axis, -100 (full left) to 100 (full right).
    #[serde(default, alias = "x")]
    pub turn: i32,
    /// Throttle axis, -100 (full reverse) to 100 (full forward).
    #[serde(default, alias = "y")]
    pub throttle: i32,
    /// Speed cap, 0 to 100.
    #[serde(default, alias = "speed")]
    pub speed_cap: i32,
    #[serde(default, alias = "ts")]
    pub sequence: Sequence,
    /// Explicit per-servo angles (front-left, front-right, rear-left,
    /// rear-right) that replace the computed steering when present.
    #[serde(default, alias = "servos", skip_serializing_if = "Option::is_none")]
    pub servo_angles: Option<Vec<i32>>,
}

impl Command {
    pub fn new(turn: i32, throttle: i32, speed_cap: i32, sequence: impl Into<Sequence>) -> Self {
        Self {
            turn,
            throttle,
            speed_cap,
            sequence: sequence.into(),
            servo_angles: None,
        }
    }

    /// Attach an explicit servo override.
    pub fn with_servo_angles(mut self, angles: impl Into<Vec<i32>>) -> Self {
        self.servo_angles = Some(angles.into());
        self
    }

    /// The servo override, if one is present and non-empty.
    pub fn explicit_angles(&self) -> Option<&[i32]> {
        self.servo_angles.as_deref().filter(|a| !a.is_empty())
    }
}

/// Motor rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Forward iff `speed >= 0`.
    pub fn of(speed: i32) -> Self {
        if speed >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }
}

/// Drive part of a [`MotionPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutput {
    /// Duty 0 on every motor, direction lines low.
    Stop,
    /// Two independently driven sides.
    Differential { left: i32, right: i32 },
    /// One drive speed for the whole vehicle; steering is done by servos only.
    Unified { speed: i32, direction: Direction },
}

impl DriveOutput {
    pub fn unified(speed: i32) -> Self {
        DriveOutput::Unified {
            speed,
            direction: Direction::of(speed),
        }
    }
}

/// Steering part of a [`MotionPlan`].
#[derive(Debug, Clone, PartialEq)]
pub enum SteeringOutput {
    /// Silence every servo signal.
    Detach,
    /// 4-wheel steering: front pair at `front`, rear pair counter-steered at
    /// `rear`, both already clamped to the safe range.
    Axles { front: f32, rear: f32 },
    /// Operator override, one angle per servo in mounting order.
    Explicit(Vec<f32>),
}

/// Output of the kinematics mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    pub drive: DriveOutput,
    pub steering: SteeringOutput,
}

impl MotionPlan {
    /// Canonical idle output: motors stopped, servos detached.
    pub const fn stop() -> Self {
        Self {
            drive: DriveOutput::Stop,
            steering: SteeringOutput::Detach,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.drive == DriveOutput::Stop && self.steering == SteeringOutput::Detach
    }
}

/// Connectivity to the command source as last observed by the actuator host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No fetch has completed yet.
    Unknown,
    Online,
    Offline,
}

/// Safety supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogState {
    Active,
    Stopped,
}

/// Status snapshot exposed by the actuator host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoverStatus {
    pub connection: ConnectionState,
    /// Seconds since the last accepted command; `None` before the first one.
    pub last_command_age_secs: Option<f64>,
    pub watchdog: WatchdogState,
    pub last_sequence: Sequence,
    pub updated_at: DateTime<Utc>,
}

/// Error taxonomy of the motion subsystem.  None of these is fatal to the
/// control loop.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Command source unreachable: {0}")]
    TransientLink(String),

    #[error("Stale command: sequence {sequence} is not newer than {last}")]
    StaleCommand { sequence: Sequence, last: Sequence },

    #[error("Hardware init failed on {channel}: {details}")]
    HardwareInit { channel: String, details: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_accepts_legacy_backend_fields() {
        let json = r#"{"x": -40, "y": 60, "speed": 80, "ts": 1718000000.25, "servo_angle": null}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.turn, -40);
        assert_eq!(cmd.throttle, 60);
        assert_eq!(cmd.speed_cap, 80);
        assert_eq!(cmd.sequence, Sequence(1718000000.25));
        assert!(cmd.servo_angles.is_none());
    }

    #[test]
    fn command_camel_case_roundtrip() {
        let cmd = Command::new(10, 20, 30, 7).with_servo_angles([90, 45, 135, 0]);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"speedCap\":30"));
        assert!(json.contains("\"servoAngles\":[90,45,135,0]"));
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let cmd: Command = serde_json::from_str("{}").unwrap();
        assert_eq!(cmd, Command::default());
        assert_eq!(cmd.sequence, Sequence::ZERO);
    }

    #[test]
    fn empty_servo_override_is_ignored() {
        let cmd = Command::new(0, 0, 0, 1).with_servo_angles(Vec::new());
        assert!(cmd.explicit_angles().is_none());
    }

    #[test]
    fn sequence_ordering_is_strict() {
        let last = Sequence::from(10);
        assert!(!Sequence::from(10).is_newer_than(last));
        assert!(!Sequence::from(9).is_newer_than(last));
        assert!(Sequence::from(11).is_newer_than(last));
        assert!(!Sequence(f64::NAN).is_newer_than(last));
    }

    #[test]
    fn direction_follows_sign() {
        assert_eq!(Direction::of(0), Direction::Forward);
        assert_eq!(Direction::of(-1), Direction::Reverse);
        assert_eq!(
            DriveOutput::unified(-30),
            DriveOutput::Unified {
                speed: -30,
                direction: Direction::Reverse
            }
        );
    }

    #[test]
    fn stop_plan_is_idle() {
        assert!(MotionPlan::stop().is_idle());
        let steering_only = MotionPlan {
            drive: DriveOutput::Stop,
            steering: SteeringOutput::Explicit(vec![90.0]),
        };
        assert!(!steering_only.is_idle());
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = RoverStatus {
            connection: ConnectionState::Offline,
            last_command_age_secs: Some(1.5),
            watchdog: WatchdogState::Stopped,
            last_sequence: Sequence::from(3),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"connection\":\"offline\""));
        assert!(json.contains("\"watchdog\":\"stopped\""));
        assert!(json.contains("\"lastCommandAgeSecs\":1.5"));
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::HardwareInit {
            channel: "servo[25]".to_string(),
            details: "pin busy".to_string(),
        };
        assert!(err.to_string().contains("servo[25]"));

        let stale = RoverError::StaleCommand {
            sequence: Sequence::from(9),
            last: Sequence::from(10),
        };
        assert!(stale.to_string().contains("not newer"));
    }
}
