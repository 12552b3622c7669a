//! Liveness reporter
//!
//! Runs a background task that publishes `{"hb": <RFC3339>}` to the status
//! topic once per period. The first heartbeat goes out one period after
//! start. Stopping is race-free: once [`LivenessHandle::stop`] returns, no
//! further heartbeat will be published. A publish that does not complete
//! within [`PUBLISH_TIMEOUT`] is abandoned, so a stalled broker can delay
//! stop but never block it.

use crate::transport::{OutboundMessage, Publisher};
use gate_shared::{codec, timing, topics, Heartbeat};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Upper bound on a single heartbeat publish
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `stop` waits for the task before aborting it
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Periodic heartbeat publisher
pub struct LivenessReporter {
    publisher: Arc<dyn Publisher>,
    period: Duration,
}

impl LivenessReporter {
    /// Create a reporter using the standard heartbeat interval
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::with_period(
            publisher,
            Duration::from_millis(timing::HEARTBEAT_INTERVAL_MS),
        )
    }

    pub fn with_period(publisher: Arc<dyn Publisher>, period: Duration) -> Self {
        Self { publisher, period }
    }

    /// Start the heartbeat background task
    /// Returns a handle that must be used to stop it
    pub fn start(self) -> LivenessHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let LivenessReporter { publisher, period } = self;

        info!(
            "[LIVENESS] Heartbeat every {}s on {} via {}",
            period.as_secs(),
            topics::GATE_STATUS,
            publisher.name()
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // Sender dropped counts as a stop request
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                if *stop_rx.borrow() {
                    break;
                }

                publish_heartbeat(publisher.as_ref()).await;
            }

            info!("[LIVENESS] Reporter stopped");
        });

        LivenessHandle { stop_tx, task }
    }
}

async fn publish_heartbeat(publisher: &dyn Publisher) {
    let heartbeat = Heartbeat::now();
    let payload = match codec::encode(&heartbeat) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[LIVENESS] Failed to encode heartbeat: {}", e);
            return;
        }
    };

    let message = OutboundMessage::new(topics::GATE_STATUS, payload);
    match timeout(PUBLISH_TIMEOUT, publisher.publish(message)).await {
        Ok(Ok(())) => debug!("[LIVENESS] Heartbeat {}", heartbeat.heartbeat),
        Ok(Err(e)) => warn!("[LIVENESS] Heartbeat publish failed: {}", e),
        Err(_) => warn!(
            "[LIVENESS] Heartbeat publish timed out after {:?}",
            PUBLISH_TIMEOUT
        ),
    }
}

/// Handle to stop the liveness reporter
pub struct LivenessHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LivenessHandle {
    /// Signal the task and wait for it to exit
    ///
    /// A heartbeat already being published completes (or times out) before
    /// this returns.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        match timeout(STOP_GRACE, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[LIVENESS] Reporter task ended abnormally: {}", e),
            Err(_) => {
                warn!("[LIVENESS] Reporter did not stop in time, aborting");
                self.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::gpio::{ActuationController, Level, MockActuator};
    use crate::transport::memory::RecordingPublisher;
    use async_trait::async_trait;
    use gate_shared::Action;
    use tokio::time::sleep;

    /// Publisher whose publishes never complete
    struct StalledPublisher;

    #[async_trait]
    impl Publisher for StalledPublisher {
        async fn publish(&self, _message: OutboundMessage) -> Result<(), GateError> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    const PERIOD: Duration = Duration::from_secs(60);

    fn start() -> (Arc<RecordingPublisher>, LivenessHandle) {
        let publisher = Arc::new(RecordingPublisher::new());
        let handle = LivenessReporter::with_period(publisher.clone(), PERIOD).start();
        (publisher, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_every_period() {
        let (publisher, handle) = start();

        sleep(PERIOD - Duration::from_secs(1)).await;
        assert!(publisher.sent().is_empty());

        sleep(PERIOD * 2 + Duration::from_secs(2)).await;
        let sent = publisher.sent_to(topics::GATE_STATUS);
        assert_eq!(sent.len(), 3);

        for message in &sent {
            let hb: Heartbeat = codec::decode(&message.payload).unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(&hb.heartbeat).is_ok());
            assert!(message.correlation_data.is_none());
        }

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_heartbeat_after_stop() {
        let (publisher, handle) = start();

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert_eq!(publisher.sent().len(), 1);

        handle.stop().await;
        sleep(PERIOD * 5).await;
        assert_eq!(publisher.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let (publisher, handle) = start();
        handle.stop().await;

        sleep(PERIOD * 2).await;
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_keeps_reporting() {
        let (publisher, handle) = start();
        publisher.set_offline(true);

        sleep(PERIOD + Duration::from_secs(1)).await;
        assert!(publisher.sent().is_empty());

        publisher.set_offline(false);
        sleep(PERIOD).await;
        assert_eq!(publisher.sent().len(), 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_returns_while_publish_is_stalled() {
        let mock = Arc::new(MockActuator::new());
        let controller = ActuationController::new(mock.clone()).unwrap();
        let handle = LivenessReporter::with_period(Arc::new(StalledPublisher), PERIOD).start();

        // First heartbeat is now stuck inside publish
        sleep(PERIOD + Duration::from_secs(1)).await;

        let stopped = timeout(PUBLISH_TIMEOUT + Duration::from_secs(1), handle.stop()).await;
        assert!(stopped.is_ok());

        // Exit sequence continues to the line cleanup
        controller.shutdown();
        for action in Action::ALL {
            assert_eq!(mock.level(action), Level::Low);
        }
    }
}
