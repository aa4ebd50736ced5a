//! The [`Actuation`] contract and the composed [`RoverDriver`].
//!
//! The rest of the stack only ever talks to [`Actuation`]: the kinematics
//! output is applied through it and the watchdog stops the rover through it.

use rover_types::{DriveOutput, RoverError, SteeringOutput};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gpio::GpioBackend;
use crate::motor::{MotorDriver, MotorPins};
use crate::servo::ServoController;

/// Hardware output contract shared by real and test drivers.
pub trait Actuation {
    /// Apply a drive output to the motors.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if a channel write fails.
    fn apply_drive(&mut self, output: &DriveOutput) -> Result<(), RoverError>;

    /// Apply a steering output to the servos.
    fn apply_steering(&mut self, output: &SteeringOutput) -> Result<(), RoverError>;

    /// Stop all motors and detach all servos.  Failures are logged, never
    /// returned: this is the fail-safe path.
    fn stop(&mut self);
}

/// Static actuation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuationConfig {
    /// Hard ceiling on motor duty, 0-100.
    pub max_speed: i32,
    pub pwm_frequency_motor: f64,
    pub pwm_frequency_servo: f64,
    pub motors: MotorPins,
    /// Front-left, front-right, rear-left, rear-right.
    pub servo_pins: [u8; 4],
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            max_speed: 100,
            pwm_frequency_motor: 1000.0,
            pwm_frequency_servo: 50.0,
            motors: MotorPins::default(),
            servo_pins: [23, 24, 25, 8],
        }
    }
}

/// Motors plus four steering servos.
pub struct RoverDriver {
    motors: MotorDriver,
    /// Mounting order: front-left, front-right, rear-left, rear-right.
    servos: Vec<ServoController>,
}

impl RoverDriver {
    /// Claim every configured channel from `backend`.  Channels that fail to
    /// initialise are inert; construction itself never fails.
    pub fn new(backend: &mut dyn GpioBackend, config: &ActuationConfig) -> Self {
        let motors = MotorDriver::new(
            backend,
            &config.motors,
            config.pwm_frequency_motor,
            config.max_speed,
        );
        let servos: Vec<ServoController> = config
            .servo_pins
            .iter()
            .map(|&pin| ServoController::new(backend, pin, config.pwm_frequency_servo))
            .collect();
        info!(
            backend = backend.name(),
            inert_servos = servos.iter().filter(|s| s.is_inert()).count(),
            "rover driver ready"
        );
        Self { motors, servos }
    }

    pub fn motors(&self) -> &MotorDriver {
        &self.motors
    }

    pub fn motors_mut(&mut self) -> &mut MotorDriver {
        &mut self.motors
    }

    pub fn servos(&self) -> &[ServoController] {
        &self.servos
    }

    pub fn servo_mut(&mut self, index: usize) -> Option<&mut ServoController> {
        self.servos.get_mut(index)
    }

    /// Last angle applied to each servo.
    pub fn last_applied_angles(&self) -> Vec<Option<f32>> {
        self.servos.iter().map(ServoController::last_angle).collect()
    }

    fn for_each_servo(
        &mut self,
        mut op: impl FnMut(usize, &mut ServoController) -> Result<(), RoverError>,
    ) -> Result<(), RoverError> {
        let mut first_err = None;
        for (i, servo) in self.servos.iter_mut().enumerate() {
            if let Err(e) = op(i, servo) {
                warn!(pin = servo.pin(), error = %e, "servo write failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Actuation for RoverDriver {
    fn apply_drive(&mut self, output: &DriveOutput) -> Result<(), RoverError> {
        self.motors.apply(output)
    }

    fn apply_steering(&mut self, output: &SteeringOutput) -> Result<(), RoverError> {
        match output {
            SteeringOutput::Detach => self.for_each_servo(|_, s| s.detach()),
            SteeringOutput::Axles { front, rear } => {
                let (front, rear) = (*front, *rear);
                self.for_each_servo(|i, s| {
                    let angle = if i < 2 { front } else { rear };
                    s.set_angle(angle).map(drop)
                })
            }
            SteeringOutput::Explicit(angles) => self.for_each_servo(|i, s| match angles.get(i) {
                Some(&angle) => s.set_angle(angle).map(drop),
                None => Ok(()),
            }),
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.motors.stop() {
            warn!(error = %e, "motor stop incomplete");
        }
        // Errors are already logged per servo.
        let _ = self.for_each_servo(|_, s| s.detach());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::servo::angle_to_duty;
    use crate::sim::{SimBackend, SimLog};

    fn driver() -> (RoverDriver, SimLog) {
        let mut backend = SimBackend::new();
        let log = backend.log();
        (RoverDriver::new(&mut backend, &ActuationConfig::default()), log)
    }

    #[test]
    fn axles_split_front_and_rear() {
        let (mut driver, log) = driver();
        driver
            .apply_steering(&SteeringOutput::Axles {
                front: 110.0,
                rear: 70.0,
            })
            .unwrap();
        assert_eq!(log.last_duty(23), Some(angle_to_duty(110.0)));
        assert_eq!(log.last_duty(24), Some(angle_to_duty(110.0)));
        assert_eq!(log.last_duty(25), Some(angle_to_duty(70.0)));
        assert_eq!(log.last_duty(8), Some(angle_to_duty(70.0)));
        assert_eq!(
            driver.last_applied_angles(),
            vec![Some(110.0), Some(110.0), Some(70.0), Some(70.0)]
        );
    }

    #[test]
    fn explicit_angles_apply_by_index_and_ignore_extras() {
        let (mut driver, log) = driver();
        driver
            .apply_steering(&SteeringOutput::Explicit(vec![90.0, 45.0]))
            .unwrap();
        assert_eq!(log.last_duty(23), Some(angle_to_duty(90.0)));
        assert_eq!(log.last_duty(24), Some(angle_to_duty(45.0)));
        assert!(log.duty_writes(25).is_empty());

        driver
            .apply_steering(&SteeringOutput::Explicit(vec![
                10.0, 20.0, 30.0, 40.0, 50.0,
            ]))
            .unwrap();
        assert_eq!(log.last_duty(8), Some(angle_to_duty(40.0)));
    }

    #[test]
    fn stop_halts_motors_and_detaches_servos() {
        let (mut driver, log) = driver();
        driver
            .apply_drive(&DriveOutput::Differential {
                left: 50,
                right: 50,
            })
            .unwrap();
        driver
            .apply_steering(&SteeringOutput::Axles {
                front: 100.0,
                rear: 80.0,
            })
            .unwrap();

        driver.stop();

        assert_eq!(log.last_duty(12), Some(0.0));
        assert_eq!(log.last_duty(13), Some(0.0));
        for pin in [23, 24, 25, 8] {
            assert_eq!(log.last_duty(pin), Some(0.0));
        }
        assert!(driver.last_applied_angles().iter().all(Option::is_none));
    }

    #[test]
    fn one_failed_servo_does_not_block_the_others() {
        let mut backend = SimBackend::new().with_failing_pin(25);
        let log = backend.log();
        let mut driver = RoverDriver::new(&mut backend, &ActuationConfig::default());
        assert!(driver.servos()[2].is_inert());

        driver
            .apply_steering(&SteeringOutput::Axles {
                front: 95.0,
                rear: 85.0,
            })
            .unwrap();
        assert!(log.duty_writes(25).is_empty());
        assert_eq!(log.last_duty(8), Some(angle_to_duty(85.0)));

        driver
            .apply_drive(&DriveOutput::Differential {
                left: 20,
                right: 20,
            })
            .unwrap();
        assert_eq!(log.last_duty(12), Some(20.0));
    }

    #[test]
    fn config_defaults_match_stock_wiring() {
        let cfg = ActuationConfig::default();
        assert_eq!(cfg.servo_pins, [23, 24, 25, 8]);
        assert_eq!(cfg.pwm_frequency_servo, 50.0);
        assert_eq!(cfg.pwm_frequency_motor, 1000.0);
        assert_eq!(cfg.max_speed, 100);
    }
}
