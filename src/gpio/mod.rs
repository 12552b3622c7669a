//! GPIO Module
//!
//! Button lines of the gate controller: the actuator capability, its
//! hardware and in-memory backends, and the controller that pulses them.

mod actuator;
mod controller;
mod mock;
#[cfg(feature = "rpi")]
mod rpi;

pub use actuator::{Actuator, ActuatorError, Level};
pub use controller::{ActuationController, PulseResult};
pub use mock::MockActuator;
#[cfg(feature = "rpi")]
pub use rpi::RpiActuator;
