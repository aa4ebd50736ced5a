//! Steering servo sub-driver.
//!
//! Maps an angle in degrees to a hobby-servo duty cycle (`2 % + angle / 18`,
//! i.e. 0° → 2 %, 90° → 7 %, 180° → 12 % at 50 Hz) and suppresses redundant
//! writes: software-timed PWM makes a servo buzz on every duty update, so a
//! request within [`JITTER_THRESHOLD_DEG`] of the last applied angle is
//! dropped.  [`ServoController::detach`] silences the signal entirely.

use rover_types::RoverError;
use tracing::{debug, error, info};

use crate::gpio::{GpioBackend, PwmChannel};

/// Duty cycle (percent) at 0°.
pub const BASE_DUTY: f32 = 2.0;
/// Degrees of travel per duty-cycle percent.
pub const DEGREES_PER_DUTY_PERCENT: f32 = 18.0;
/// Requests closer than this to the last applied angle are not written.
pub const JITTER_THRESHOLD_DEG: f32 = 1.0;

pub const MIN_ANGLE: f32 = 0.0;
pub const MAX_ANGLE: f32 = 180.0;

/// Duty-cycle percentage for `angle`, clamped to `[0, 180]` first.
pub fn angle_to_duty(angle: f32) -> f32 {
    BASE_DUTY + angle.clamp(MIN_ANGLE, MAX_ANGLE) / DEGREES_PER_DUTY_PERCENT
}

/// One steering servo on a PWM pin.
pub struct ServoController {
    pin: u8,
    /// `None` when the channel failed to initialise.
    pwm: Option<Box<dyn PwmChannel>>,
    last_angle: Option<f32>,
}

impl ServoController {
    /// Claim `pin` for a servo.  An init failure is logged and yields an inert
    /// controller whose calls are no-ops.
    pub fn new(backend: &mut dyn GpioBackend, pin: u8, frequency_hz: f64) -> Self {
        let pwm = match backend.pwm(pin, frequency_hz) {
            Ok(pwm) => Some(pwm),
            Err(e) => {
                error!(pin, error = %e, "servo failed to initialise; leaving it inert");
                None
            }
        };
        Self {
            pin,
            pwm,
            last_angle: None,
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn is_inert(&self) -> bool {
        self.pwm.is_none()
    }

    /// Last angle actually written, `None` after a detach or before the first
    /// write.
    pub fn last_angle(&self) -> Option<f32> {
        self.last_angle
    }

    /// Move to `angle` degrees (clamped to `[0, 180]`).
    ///
    /// Returns `Ok(true)` when a duty cycle was written and `Ok(false)` when
    /// the request was suppressed (within the jitter threshold, non-finite, or
    /// inert channel).
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the PWM write fails; the last
    /// applied angle is left unchanged in that case.
    pub fn set_angle(&mut self, angle: f32) -> Result<bool, RoverError> {
        let Some(pwm) = self.pwm.as_mut() else {
            return Ok(false);
        };
        if !angle.is_finite() {
            debug!(pin = self.pin, "ignoring non-finite servo angle");
            return Ok(false);
        }
        let angle = angle.clamp(MIN_ANGLE, MAX_ANGLE);
        if self
            .last_angle
            .is_some_and(|last| (angle - last).abs() < JITTER_THRESHOLD_DEG)
        {
            return Ok(false);
        }

        let duty = angle_to_duty(angle);
        pwm.set_duty_cycle(duty)?;
        self.last_angle = Some(angle);
        info!(pin = self.pin, angle = format_args!("{angle:.1}"), duty, "servo moved");
        Ok(true)
    }

    /// Stop sending a PWM signal so an idle servo does not buzz.
    ///
    /// Always writes (no jitter check) and forgets the last angle, so the next
    /// [`set_angle`][Self::set_angle] re-engages the servo even at the same
    /// position.
    pub fn detach(&mut self) -> Result<(), RoverError> {
        let Some(pwm) = self.pwm.as_mut() else {
            return Ok(());
        };
        pwm.set_duty_cycle(0.0)?;
        self.last_angle = None;
        Ok(())
    }
}
