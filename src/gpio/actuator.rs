//! Actuator capability
//!
//! The only thing the controller needs from hardware is "drive this button's
//! line high or low". Implementations are picked at startup from config.

use gate_shared::Action;
use std::fmt;
use thiserror::Error;

/// Logical level of a button line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// Hardware-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("GPIO init failed: {0}")]
    Init(String),

    #[error("failed to drive {action} {level}: {reason}")]
    Transition {
        action: Action,
        level: Level,
        reason: String,
    },

    #[error("{action} left engaged after {attempts} attempts to release: {reason}")]
    StuckHigh {
        action: Action,
        attempts: u32,
        reason: String,
    },

    #[error("pulse task for {0} aborted")]
    Aborted(Action),
}

/// Drives the four gate button lines
pub trait Actuator: Send + Sync {
    /// Set the line for `action` to `level`
    fn set_level(&self, action: Action, level: Level) -> Result<(), ActuatorError>;

    /// Human-readable backend name
    fn name(&self) -> &'static str;
}
