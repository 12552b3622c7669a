//! Actuation controller
//!
//! Owns the four button lines and performs timed pulses on them. Each line
//! has its own lock: two pulses on the same button are serialized, pulses on
//! different buttons run side by side.

use super::actuator::{Actuator, ActuatorError, Level};
use gate_shared::{timing, Acknowledgment, Action};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// How many times "set low" is tried before a pulse is reported stuck
pub const RELEASE_ATTEMPTS: u32 = 3;

/// Pause between release attempts
const RELEASE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Result of a pulse attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseResult {
    pub action: String,
    pub success: bool,
    pub error: Option<String>,
}

impl PulseResult {
    /// Pulse completed
    pub fn success(action: Action) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            error: None,
        }
    }

    /// Pulse failed or was never started
    pub fn failure(action: impl Into<String>, error: impl ToString) -> Self {
        Self {
            action: action.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// Convert into the wire acknowledgment
    pub fn to_acknowledgment(&self) -> Acknowledgment {
        match (&self.error, self.success) {
            (_, true) => Acknowledgment::success(self.action.clone()),
            (Some(e), false) => Acknowledgment::failed(self.action.clone(), e.clone()),
            (None, false) => Acknowledgment::failed(self.action.clone(), "unknown error"),
        }
    }
}

/// A line that has been driven high and must be brought back low
///
/// `release` retries the low transition; if the guard is dropped without a
/// successful release (error path, task torn down) `Drop` makes one more
/// attempt.
struct EngagedLine<'a> {
    actuator: &'a dyn Actuator,
    action: Action,
    released: bool,
}

impl<'a> EngagedLine<'a> {
    /// Drive the line high. On failure the line is driven low before the
    /// error is returned.
    fn engage(actuator: &'a dyn Actuator, action: Action) -> Result<Self, ActuatorError> {
        if let Err(e) = actuator.set_level(action, Level::High) {
            if let Err(low_err) = actuator.set_level(action, Level::Low) {
                error!("[GPIO] {} failed to engage and to reset: {}", action, low_err);
            }
            return Err(e);
        }

        Ok(Self {
            actuator,
            action,
            released: false,
        })
    }

    /// Drive the line low, retrying up to [`RELEASE_ATTEMPTS`] times
    async fn release(mut self) -> Result<(), ActuatorError> {
        let mut last_error = String::new();

        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.actuator.set_level(self.action, Level::Low) {
                Ok(()) => {
                    if attempt > 1 {
                        warn!("[GPIO] {} released on attempt {}", self.action, attempt);
                    }
                    self.released = true;
                    return Ok(());
                }
                Err(e) => {
                    warn!("[GPIO] {} release attempt {} failed: {}", self.action, attempt, e);
                    last_error = e.to_string();
                    if attempt < RELEASE_ATTEMPTS {
                        sleep(RELEASE_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(ActuatorError::StuckHigh {
            action: self.action,
            attempts: RELEASE_ATTEMPTS,
            reason: last_error,
        })
    }
}

impl Drop for EngagedLine<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.actuator.set_level(self.action, Level::Low) {
            Ok(()) => warn!("[GPIO] {} released by guard", self.action),
            Err(e) => error!("[GPIO] {} MAY BE ENGAGED: final release failed: {}", self.action, e),
        }
    }
}

struct ControllerInner {
    actuator: Arc<dyn Actuator>,
    /// One lock per line, indexed by `Action::index()`
    locks: [Mutex<()>; 4],
}

impl ControllerInner {
    async fn run_pulse(&self, action: Action) -> Result<(), ActuatorError> {
        let _held = self.locks[action.index()].lock().await;

        debug!("[GPIO] {} pulse start", action);
        let line = EngagedLine::engage(self.actuator.as_ref(), action)?;
        sleep(Duration::from_millis(timing::PULSE_DURATION_MS)).await;
        line.release().await?;
        debug!("[GPIO] {} pulse done", action);

        Ok(())
    }
}

/// Serializes pulses per button line
#[derive(Clone)]
pub struct ActuationController {
    inner: Arc<ControllerInner>,
}

impl ActuationController {
    /// Create a controller, driving every line low first
    pub fn new(actuator: Arc<dyn Actuator>) -> Result<Self, ActuatorError> {
        for action in Action::ALL {
            actuator.set_level(action, Level::Low)?;
        }
        info!("[GPIO] Controller ready ({} backend)", actuator.name());

        Ok(Self {
            inner: Arc::new(ControllerInner {
                actuator,
                locks: Default::default(),
            }),
        })
    }

    /// Press a button: high, hold, low
    ///
    /// Waits for any in-flight pulse on the same line. The pulse runs on its
    /// own task, so it completes even if the caller goes away.
    pub async fn pulse(&self, action: Action) -> PulseResult {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.run_pulse(action).await });

        match task.await {
            Ok(Ok(())) => PulseResult::success(action),
            Ok(Err(e)) => {
                error!("[GPIO] {} pulse failed: {}", action, e);
                PulseResult::failure(action.as_str(), e)
            }
            Err(join_err) => {
                error!("[GPIO] {} pulse task failed: {}", action, join_err);
                PulseResult::failure(action.as_str(), ActuatorError::Aborted(action))
            }
        }
    }

    /// Drive every line low. Best-effort: failures are logged, not returned.
    pub fn shutdown(&self) {
        info!("[GPIO] Cleanup: driving all lines low");
        for action in Action::ALL {
            if let Err(e) = self.inner.actuator.set_level(action, Level::Low) {
                error!("[GPIO] Cleanup of {} failed: {}", action, e);
            }
        }
    }

    /// Name of the backend in use
    pub fn backend(&self) -> &'static str {
        self.inner.actuator.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::mock::MockActuator;
    use tokio::time::Instant;

    fn setup() -> (Arc<MockActuator>, ActuationController) {
        let mock = Arc::new(MockActuator::new());
        let controller = ActuationController::new(mock.clone()).expect("controller init");
        (mock, controller)
    }

    /// (high, low) instants for every completed pulse on `action`
    fn pulses(mock: &MockActuator, action: Action) -> Vec<(Instant, Instant)> {
        let transitions = mock.transitions_for(action);
        let mut out = Vec::new();
        let mut high = None;
        for t in transitions {
            match (t.level, high) {
                (Level::High, _) => high = Some(t.at),
                (Level::Low, Some(h)) => {
                    out.push((h, t.at));
                    high = None;
                }
                (Level::Low, None) => {}
            }
        }
        out
    }

    #[tokio::test]
    async fn test_init_drives_all_low() {
        let (mock, _controller) = setup();
        let transitions = mock.transitions();
        assert_eq!(transitions.len(), 4);
        assert!(transitions.iter().all(|t| t.level == Level::Low));
    }

    #[tokio::test]
    async fn test_init_fails_on_hardware_error() {
        let mock = Arc::new(MockActuator::new());
        mock.fail_next(Action::Right, Level::Low, 1);
        assert!(ActuationController::new(mock).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_holds_for_duration() {
        let (mock, controller) = setup();

        let result = controller.pulse(Action::Full).await;
        assert_eq!(result, PulseResult::success(Action::Full));

        let done = pulses(&mock, Action::Full);
        assert_eq!(done.len(), 1);
        let (high, low) = done[0];
        assert!(low - high >= Duration::from_millis(timing::PULSE_DURATION_MS));
        assert_eq!(mock.level(Action::Full), Level::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_line_is_serialized() {
        let (mock, controller) = setup();
        let start = Instant::now();

        let (a, b) = tokio::join!(
            controller.pulse(Action::Pedestrian),
            controller.pulse(Action::Pedestrian)
        );
        assert!(a.success && b.success);

        let done = pulses(&mock, Action::Pedestrian);
        assert_eq!(done.len(), 2);
        // Second high never starts before the first low
        assert!(done[1].0 >= done[0].1);
        assert!(start.elapsed() >= Duration::from_millis(2 * timing::PULSE_DURATION_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_lines_run_concurrently() {
        let (mock, controller) = setup();
        let start = Instant::now();

        let results = futures::future::join_all(
            Action::ALL.iter().map(|a| controller.pulse(*a)),
        )
        .await;
        assert!(results.iter().all(|r| r.success));

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(timing::PULSE_DURATION_MS));
        assert!(elapsed < Duration::from_millis(2 * timing::PULSE_DURATION_MS));
        for action in Action::ALL {
            assert_eq!(pulses(&mock, action).len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_engage_failure_resets_line() {
        let (mock, controller) = setup();
        mock.fail_next(Action::Left, Level::High, 1);

        let result = controller.pulse(Action::Left).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("HIGH"));
        assert_eq!(mock.level(Action::Left), Level::Low);
        // Init low + reset low, never high
        assert!(mock
            .transitions_for(Action::Left)
            .iter()
            .all(|t| t.level == Level::Low));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_retry_recovers() {
        let (mock, controller) = setup();
        mock.fail_next(Action::Right, Level::Low, 1);

        let result = controller.pulse(Action::Right).await;
        assert!(result.success);
        assert_eq!(mock.level(Action::Right), Level::Low);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_exhausted_reports_failure() {
        let (mock, controller) = setup();
        mock.fail_next(Action::Full, Level::Low, RELEASE_ATTEMPTS);

        let result = controller.pulse(Action::Full).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("left engaged"));
        // The guard's final attempt brings it back down
        assert_eq!(mock.level(Action::Full), Level::Low);
    }

    #[tokio::test]
    async fn test_shutdown_is_best_effort() {
        let (mock, controller) = setup();
        mock.fail_next(Action::Pedestrian, Level::Low, 1);

        controller.shutdown();

        // 4 from init, 3 from shutdown (pedestrian failed)
        let lows = mock
            .transitions()
            .iter()
            .filter(|t| t.level == Level::Low)
            .count();
        assert_eq!(lows, 7);
    }

    #[test]
    fn test_pulse_result_to_ack() {
        let ack = PulseResult::failure("bogus", "unknown action: bogus").to_acknowledgment();
        assert_eq!(ack.action, "bogus");
        assert_eq!(ack.error.as_deref(), Some("unknown action: bogus"));
    }
}
