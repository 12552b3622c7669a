//! Raspberry Pi GPIO actuator
//!
//! Pin map (BCM numbering, header pin in parentheses):
//! - full        GPIO17 (P1-11)
//! - pedestrian  GPIO4  (P1-7)
//! - right       GPIO27 (P1-13)
//! - left        GPIO22 (P1-15)

use super::actuator::{Actuator, ActuatorError, Level};
use gate_shared::Action;
use rppal::gpio::{Gpio, OutputPin};
use std::sync::Mutex;
use tracing::info;

/// BCM pin number wired to each button
pub fn bcm_pin(action: Action) -> u8 {
    match action {
        Action::Full => 17,
        Action::Pedestrian => 4,
        Action::Right => 27,
        Action::Left => 22,
    }
}

/// Actuator backed by the Pi's GPIO character device
pub struct RpiActuator {
    /// Output pins, indexed by `Action::index()`
    pins: Vec<Mutex<OutputPin>>,
}

impl RpiActuator {
    /// Claim the four output pins, each starting low
    pub fn new() -> Result<Self, ActuatorError> {
        let gpio = Gpio::new().map_err(|e| ActuatorError::Init(e.to_string()))?;

        let mut pins = Vec::with_capacity(Action::ALL.len());
        for action in Action::ALL {
            let pin = gpio
                .get(bcm_pin(action))
                .map_err(|e| ActuatorError::Init(format!("GPIO{}: {}", bcm_pin(action), e)))?
                .into_output_low();
            info!("[GPIO] {} bound to GPIO{}", action, bcm_pin(action));
            pins.push(Mutex::new(pin));
        }

        Ok(Self { pins })
    }
}

impl Actuator for RpiActuator {
    fn set_level(&self, action: Action, level: Level) -> Result<(), ActuatorError> {
        let mut pin = self.pins[action.index()]
            .lock()
            .map_err(|_| ActuatorError::Transition {
                action,
                level,
                reason: "pin lock poisoned".into(),
            })?;

        match level {
            Level::High => pin.set_high(),
            Level::Low => pin.set_low(),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "rpi-gpio"
    }
}
