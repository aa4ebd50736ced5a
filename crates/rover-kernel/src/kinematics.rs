//! [`Kinematics`] – joystick command to motor/servo mapping.
//!
//! A pure function of `(turn, throttle, speed_cap)`.  Every input is clamped
//! into range first, a per-axis deadzone removes stick noise, and an idle
//! stick always produces [`MotionPlan::stop`] regardless of the speed cap.
//!
//! Two drive variants share the same steering rule:
//!
//! - [`DriveMode::Differential`] – skid steer plus 4-wheel steering: each side
//!   runs at `throttle ± turn`.
//! - [`DriveMode::Unified`] – one drive speed from `throttle` alone; turning
//!   is left entirely to the servos.
//!
//! Steering counter-steers the axles: with `delta = turn * gain / 100` the
//! front pair goes to `90 + delta` and the rear pair to `90 - delta`, both
//! clamped to the configured safe range.

use rover_types::{Command, DriveOutput, MotionPlan, SteeringOutput};
use serde::{Deserialize, Serialize};

/// Servo angle for straight ahead.
pub const CENTER_ANGLE: f32 = 90.0;

const AXIS_LIMIT: i32 = 100;
const MAX_CAP: i32 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Drive-train variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveMode {
    #[default]
    Differential,
    Unified,
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveMode::Differential => write!(f, "differential"),
            DriveMode::Unified => write!(f, "unified"),
        }
    }
}

impl std::str::FromStr for DriveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "differential" => Ok(DriveMode::Differential),
            "unified" => Ok(DriveMode::Unified),
            other => Err(format!("unknown drive mode '{other}'")),
        }
    }
}

/// `[kinematics]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    pub mode: DriveMode,
    /// Axis values with a magnitude below this are treated as zero.
    pub deadzone_threshold: i32,
    /// Steering deflection in degrees at full turn.
    pub steering_gain_degrees: f32,
    /// `[min, max]` servo angles the steering mechanism tolerates.
    pub safe_angle_range: [f32; 2],
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            mode: DriveMode::Differential,
            deadzone_threshold: 5,
            steering_gain_degrees: 20.0,
            safe_angle_range: [70.0, 110.0],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Kinematics
// ────────────────────────────────────────────────────────────────────────────

/// Configured mapper.  Construction normalises the configuration so that
/// [`map`][Self::map] can never panic on a bad range.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    mode: DriveMode,
    deadzone: i32,
    gain: f32,
    safe_min: f32,
    safe_max: f32,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::new(&KinematicsConfig::default())
    }
}

impl Kinematics {
    pub fn new(config: &KinematicsConfig) -> Self {
        let [a, b] = config.safe_angle_range;
        let (a, b) = (finite_or(a, 0.0), finite_or(b, 180.0));
        Self {
            mode: config.mode,
            deadzone: config.deadzone_threshold.max(0),
            gain: finite_or(config.steering_gain_degrees, 0.0),
            safe_min: a.min(b).clamp(0.0, 180.0),
            safe_max: a.max(b).clamp(0.0, 180.0),
        }
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn safe_range(&self) -> (f32, f32) {
        (self.safe_min, self.safe_max)
    }

    /// Map a stick position to a [`MotionPlan`].
    pub fn map(&self, turn: i32, throttle: i32, speed_cap: i32) -> MotionPlan {
        let cap = speed_cap.clamp(0, MAX_CAP);
        let turn = self.deadzone(turn.clamp(-AXIS_LIMIT, AXIS_LIMIT));
        let throttle = self.deadzone(throttle.clamp(-AXIS_LIMIT, AXIS_LIMIT));

        if turn == 0 && throttle == 0 {
            return MotionPlan::stop();
        }

        let drive = match self.mode {
            DriveMode::Differential => DriveOutput::Differential {
                left: (throttle + turn).clamp(-cap, cap),
                right: (throttle - turn).clamp(-cap, cap),
            },
            DriveMode::Unified => DriveOutput::unified(throttle.clamp(-cap, cap)),
        };

        MotionPlan {
            drive,
            steering: self.steering(turn),
        }
    }

    /// Map a full [`Command`], honouring an explicit servo override.
    ///
    /// The override replaces the steering part of the plan even when the
    /// stick is idle; the drive part is always computed.
    pub fn plan_for(&self, command: &Command) -> MotionPlan {
        let mut plan = self.map(command.turn, command.throttle, command.speed_cap);
        if let Some(angles) = command.explicit_angles() {
            plan.steering = SteeringOutput::Explicit(angles.iter().map(|&a| a as f32).collect());
        }
        plan
    }

    fn deadzone(&self, value: i32) -> i32 {
        if value.abs() < self.deadzone { 0 } else { value }
    }

    fn steering(&self, turn: i32) -> SteeringOutput {
        if turn == 0 {
            return SteeringOutput::Axles {
                front: CENTER_ANGLE,
                rear: CENTER_ANGLE,
            };
        }
        let delta = turn as f32 * self.gain / 100.0;
        SteeringOutput::Axles {
            front: (CENTER_ANGLE + delta).clamp(self.safe_min, self.safe_max),
            rear: (CENTER_ANGLE - delta).clamp(self.safe_min, self.safe_max),
        }
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rover_types::Direction;

    fn differential() -> Kinematics {
        Kinematics::default()
    }

    fn unified() -> Kinematics {
        Kinematics::new(&KinematicsConfig {
            mode: DriveMode::Unified,
            ..KinematicsConfig::default()
        })
    }

    fn axles(plan: &MotionPlan) -> (f32, f32) {
        match plan.steering {
            SteeringOutput::Axles { front, rear } => (front, rear),
            ref other => panic!("expected axle steering, got {other:?}"),
        }
    }

    #[test]
    fn full_right_spins_in_place() {
        let plan = differential().map(100, 0, 100);
        assert_eq!(
            plan.drive,
            DriveOutput::Differential {
                left: 100,
                right: -100
            }
        );
        assert_eq!(axles(&plan), (110.0, 70.0));
    }

    #[test]
    fn half_left_half_forward() {
        let plan = differential().map(-50, 50, 100);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 0, right: 100 });
        assert_eq!(axles(&plan), (80.0, 100.0));
    }

    #[test]
    fn idle_stick_stops_for_any_cap() {
        for cap in [0, 1, 50, 100] {
            assert_eq!(differential().map(0, 0, cap), MotionPlan::stop());
            assert_eq!(unified().map(0, 0, cap), MotionPlan::stop());
        }
    }

    #[test]
    fn deadzone_applies_per_axis() {
        assert_eq!(differential().map(4, 0, 100), MotionPlan::stop());
        assert_eq!(differential().map(4, -4, 100), MotionPlan::stop());

        // turn inside the deadzone, throttle outside: wheels straight.
        let plan = differential().map(4, 30, 100);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 30, right: 30 });
        assert_eq!(axles(&plan), (CENTER_ANGLE, CENTER_ANGLE));

        // Exactly at the threshold is not inside it.
        let plan = differential().map(5, 0, 100);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 5, right: -5 });
    }

    #[test]
    fn speed_cap_limits_each_side() {
        let plan = differential().map(60, 80, 50);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 50, right: 20 });
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        let plan = differential().map(500, -500, 300);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 0, right: -100 });
        assert_eq!(axles(&plan), (110.0, 70.0));

        // Negative cap behaves as zero: stationary but still steering.
        let plan = differential().map(40, 40, -10);
        assert_eq!(plan.drive, DriveOutput::Differential { left: 0, right: 0 });
    }

    #[test]
    fn unified_ignores_turn_for_speed() {
        let plan = unified().map(80, -40, 100);
        assert_eq!(
            plan.drive,
            DriveOutput::Unified {
                speed: -40,
                direction: Direction::Reverse
            }
        );
        // Turn-only input still steers without driving.
        let plan = unified().map(-100, 0, 100);
        assert_eq!(plan.drive, DriveOutput::unified(0));
        assert_eq!(axles(&plan), (70.0, 110.0));
    }

    #[test]
    fn explicit_angles_override_steering_even_when_idle() {
        let k = differential();
        let cmd = Command::new(0, 0, 100, 1).with_servo_angles([90, 45, 135, 0]);
        let plan = k.plan_for(&cmd);
        assert_eq!(plan.drive, DriveOutput::Stop);
        assert_eq!(
            plan.steering,
            SteeringOutput::Explicit(vec![90.0, 45.0, 135.0, 0.0])
        );
        assert!(!plan.is_idle());

        let cmd = Command::new(50, 50, 100, 2).with_servo_angles(Vec::new());
        assert!(matches!(k.plan_for(&cmd).steering, SteeringOutput::Axles { .. }));
    }

    #[test]
    fn reversed_safe_range_is_normalised() {
        let k = Kinematics::new(&KinematicsConfig {
            safe_angle_range: [110.0, 70.0],
            ..KinematicsConfig::default()
        });
        assert_eq!(k.safe_range(), (70.0, 110.0));
        assert_eq!(axles(&k.map(100, 0, 100)), (110.0, 70.0));
    }

    #[test]
    fn drive_mode_parses_case_insensitively() {
        assert_eq!("Unified".parse::<DriveMode>(), Ok(DriveMode::Unified));
        assert_eq!(" differential ".parse::<DriveMode>(), Ok(DriveMode::Differential));
        assert!("tank".parse::<DriveMode>().is_err());
    }

    #[test]
    fn config_toml_section() {
        let cfg: KinematicsConfig = toml::from_str(
            r#"
mode = "unified"
steering_gain_degrees = 15.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, DriveMode::Unified);
        assert_eq!(cfg.deadzone_threshold, 5);
        assert_eq!(cfg.safe_angle_range, [70.0, 110.0]);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(512))]

        #[test]
        fn prop_outputs_stay_within_limits(
            turn in -100i32..=100,
            throttle in -100i32..=100,
            cap in 0i32..=100,
            unified_mode in any::<bool>(),
        ) {
            let k = if unified_mode { unified() } else { differential() };
            let plan = k.map(turn, throttle, cap);
            match plan.drive {
                DriveOutput::Stop => {}
                DriveOutput::Differential { left, right } => {
                    prop_assert!(left.abs() <= cap && right.abs() <= cap);
                }
                DriveOutput::Unified { speed, direction } => {
                    prop_assert!(speed.abs() <= cap);
                    prop_assert_eq!(direction, Direction::of(speed));
                }
            }
            match plan.steering {
                SteeringOutput::Detach => prop_assert!(plan.drive == DriveOutput::Stop),
                SteeringOutput::Axles { front, rear } => {
                    prop_assert!((70.0..=110.0).contains(&front));
                    prop_assert!((70.0..=110.0).contains(&rear));
                }
                SteeringOutput::Explicit(_) => prop_assert!(false, "no override given"),
            }
        }

        #[test]
        fn prop_idle_after_deadzone_is_stop(
            turn in -4i32..=4,
            throttle in -4i32..=4,
            cap in 0i32..=100,
        ) {
            prop_assert_eq!(differential().map(turn, throttle, cap), MotionPlan::stop());
        }
    }
}
