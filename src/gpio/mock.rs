//! In-memory actuator
//!
//! Logs every transition instead of touching pins. Used with
//! `--actuator mock` on development machines and as the test double for the
//! controller, dispatcher and transports.

use super::actuator::{Actuator, ActuatorError, Level};
use gate_shared::Action;
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::info;

/// A successful level change, with the time it happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub level: Level,
    pub at: Instant,
}

/// An injected failure for the next `remaining` matching calls
#[derive(Debug)]
struct Fault {
    action: Action,
    level: Level,
    remaining: u32,
}

/// Actuator that records transitions in memory
#[derive(Debug, Default)]
pub struct MockActuator {
    transitions: Mutex<Vec<Transition>>,
    faults: Mutex<Vec<Fault>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockActuator {
    pub fn new() -> Self {
        info!("[GPIO] Initializing mock actuator");
        Self::default()
    }

    /// Make the next `times` calls driving `action` to `level` fail
    #[cfg(test)]
    pub fn fail_next(&self, action: Action, level: Level, times: u32) {
        lock(&self.faults).push(Fault {
            action,
            level,
            remaining: times,
        });
    }

    /// All recorded transitions, oldest first
    #[cfg(test)]
    pub fn transitions(&self) -> Vec<Transition> {
        lock(&self.transitions).clone()
    }

    /// Recorded transitions for a single action
    #[cfg(test)]
    pub fn transitions_for(&self, action: Action) -> Vec<Transition> {
        lock(&self.transitions)
            .iter()
            .filter(|t| t.action == action)
            .copied()
            .collect()
    }

    /// Current level of a line (lines start low)
    #[cfg(test)]
    pub fn level(&self, action: Action) -> Level {
        lock(&self.transitions)
            .iter()
            .rev()
            .find(|t| t.action == action)
            .map(|t| t.level)
            .unwrap_or(Level::Low)
    }

    fn take_fault(&self, action: Action, level: Level) -> bool {
        let mut faults = lock(&self.faults);
        if let Some(pos) = faults
            .iter()
            .position(|f| f.action == action && f.level == level && f.remaining > 0)
        {
            faults[pos].remaining -= 1;
            if faults[pos].remaining == 0 {
                faults.remove(pos);
            }
            return true;
        }
        false
    }
}

impl Actuator for MockActuator {
    fn set_level(&self, action: Action, level: Level) -> Result<(), ActuatorError> {
        if self.take_fault(action, level) {
            return Err(ActuatorError::Transition {
                action,
                level,
                reason: "injected fault".into(),
            });
        }

        info!("[GPIO] mock: {} -> {}", action, level);
        lock(&self.transitions).push(Transition {
            action,
            level,
            at: Instant::now(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
