//! Raspberry Pi GPIO backend.
//!
//! Uses `rppal` software PWM, which has the same timing jitter as the
//! RPi.GPIO-style libraries hobby rovers are usually wired against; the servo
//! driver's anti-jitter rule and detach-on-idle exist because of it.

use rppal::gpio::{Gpio, OutputPin};
use rover_types::RoverError;
use tracing::info;

use crate::gpio::{DigitalOutput, GpioBackend, PwmChannel};

fn fault(pin: u8, err: rppal::gpio::Error) -> RoverError {
    RoverError::HardwareFault {
        component: format!("gpio{pin}"),
        details: err.to_string(),
    }
}

fn init_error(pin: u8, err: rppal::gpio::Error) -> RoverError {
    RoverError::HardwareInit {
        channel: format!("gpio{pin}"),
        details: err.to_string(),
    }
}

pub struct RpiOutput {
    pin: OutputPin,
}

impl DigitalOutput for RpiOutput {
    fn set_high(&mut self) -> Result<(), RoverError> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), RoverError> {
        self.pin.set_low();
        Ok(())
    }
}

pub struct RpiPwm {
    pin: OutputPin,
    frequency_hz: f64,
}

impl PwmChannel for RpiPwm {
    fn set_duty_cycle(&mut self, percent: f32) -> Result<(), RoverError> {
        let duty = f64::from(percent.clamp(0.0, 100.0)) / 100.0;
        let number = self.pin.pin();
        self.pin
            .set_pwm_frequency(self.frequency_hz, duty)
            .map_err(|e| fault(number, e))
    }
}

/// Backend over the BCM-numbered GPIO header.
pub struct RpiBackend {
    gpio: Gpio,
}

impl RpiBackend {
    /// Open the GPIO character device.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareInit`] when the chip cannot be opened
    /// (not a Pi, missing permissions).
    pub fn new() -> Result<Self, RoverError> {
        let gpio = Gpio::new().map_err(|e| RoverError::HardwareInit {
            channel: "gpiochip".to_string(),
            details: e.to_string(),
        })?;
        info!("raspberry pi gpio backend opened");
        Ok(Self { gpio })
    }
}

impl GpioBackend for RpiBackend {
    fn name(&self) -> &str {
        "rpi"
    }

    fn output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>, RoverError> {
        let pin = self
            .gpio
            .get(pin)
            .map_err(|e| init_error(pin, e))?
            .into_output_low();
        Ok(Box::new(RpiOutput { pin }))
    }

    fn pwm(&mut self, pin: u8, frequency_hz: f64) -> Result<Box<dyn PwmChannel>, RoverError> {
        let mut out = self
            .gpio
            .get(pin)
            .map_err(|e| init_error(pin, e))?
            .into_output_low();
        out.set_pwm_frequency(frequency_hz, 0.0)
            .map_err(|e| init_error(pin, e))?;
        Ok(Box::new(RpiPwm {
            pin: out,
            frequency_hz,
        }))
    }
}
