//! Command dispatcher - validates and dispatches incoming commands

use crate::gpio::{ActuationController, PulseResult};
use crate::transport::OutboundMessage;
use bytes::Bytes;
use gate_shared::codec::{self, CodecError};
use gate_shared::{Action, GateCommand};
use std::time::Instant;
use tracing::{info, warn};

/// Where the reply to a pub/sub command should go
///
/// Empty for HTTP commands, which are answered synchronously.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationContext {
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
}

impl CorrelationContext {
    /// No reply expected
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(response_topic: Option<String>, correlation_data: Option<Bytes>) -> Self {
        Self {
            response_topic: response_topic.filter(|t| !t.is_empty()),
            correlation_data,
        }
    }
}

/// Maps commands onto controller pulses
pub struct CommandDispatcher {
    controller: ActuationController,
}

impl CommandDispatcher {
    /// Create a new command dispatcher
    pub fn new(controller: ActuationController) -> Self {
        Self { controller }
    }

    /// Execute a command and return the pulse result unchanged
    ///
    /// An unknown action yields a failed result without touching any line.
    pub async fn dispatch(
        &self,
        command: &GateCommand,
        correlation: &CorrelationContext,
    ) -> PulseResult {
        let action = match command.action.parse::<Action>() {
            Ok(action) => action,
            Err(e) => {
                warn!("Rejected command: {}", e);
                return PulseResult::failure(command.action.clone(), e);
            }
        };

        info!(
            "Executing command: action={} reply_to={}",
            action,
            correlation.response_topic.as_deref().unwrap_or("-")
        );
        let start_time = Instant::now();

        let result = self.controller.pulse(action).await;

        let processing_time = start_time.elapsed().as_millis();
        if result.success {
            info!("  Command completed: {} ({}ms)", action, processing_time);
        } else {
            warn!(
                "  Command failed: {} ({}ms): {}",
                action,
                processing_time,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        result
    }

    /// Build the acknowledgment for a pub/sub command
    ///
    /// Returns `None` when the command carried no response topic.
    pub fn acknowledgment(
        result: &PulseResult,
        correlation: &CorrelationContext,
    ) -> Result<Option<OutboundMessage>, CodecError> {
        let Some(topic) = &correlation.response_topic else {
            return Ok(None);
        };

        let payload = codec::encode(&result.to_acknowledgment())?;
        Ok(Some(
            OutboundMessage::new(topic.clone(), payload)
                .with_correlation(correlation.correlation_data.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{Level, MockActuator};
    use gate_shared::{AckStatus, Acknowledgment};
    use std::sync::Arc;

    fn setup() -> (Arc<MockActuator>, CommandDispatcher) {
        let mock = Arc::new(MockActuator::new());
        let controller = ActuationController::new(mock.clone()).unwrap();
        (mock, CommandDispatcher::new(controller))
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_known_action() {
        let (mock, dispatcher) = setup();

        let result = dispatcher
            .dispatch(&GateCommand::new("full"), &CorrelationContext::none())
            .await;

        assert!(result.success);
        assert_eq!(result.action, "full");
        let levels: Vec<Level> = mock
            .transitions_for(Action::Full)
            .iter()
            .map(|t| t.level)
            .collect();
        assert_eq!(levels, vec![Level::Low, Level::High, Level::Low]);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action_touches_nothing() {
        let (mock, dispatcher) = setup();
        let before = mock.transitions().len();

        let result = dispatcher
            .dispatch(&GateCommand::new("bogus"), &CorrelationContext::none())
            .await;

        assert!(!result.success);
        assert_eq!(result.action, "bogus");
        assert_eq!(result.error.as_deref(), Some("unknown action: bogus"));
        assert_eq!(mock.transitions().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_hardware_failure() {
        let (mock, dispatcher) = setup();
        mock.fail_next(Action::Right, Level::High, 1);

        let result = dispatcher
            .dispatch(&GateCommand::new("right"), &CorrelationContext::none())
            .await;

        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_ack_requires_response_topic() {
        let result = PulseResult::success(Action::Left);
        let ack = CommandDispatcher::acknowledgment(&result, &CorrelationContext::none()).unwrap();
        assert!(ack.is_none());

        // Empty response topic counts as absent
        let ctx = CorrelationContext::new(Some(String::new()), Some(Bytes::from_static(b"id")));
        assert!(ctx.response_topic.is_none());
    }

    #[test]
    fn test_ack_carries_correlation() {
        let ctx = CorrelationContext::new(
            Some("replies/app-1".into()),
            Some(Bytes::from_static(b"req-42")),
        );
        let result = PulseResult::failure("left", "pin fault");

        let msg = CommandDispatcher::acknowledgment(&result, &ctx)
            .unwrap()
            .expect("ack expected");

        assert_eq!(msg.topic, "replies/app-1");
        assert_eq!(msg.correlation_data, Some(Bytes::from_static(b"req-42")));
        let ack: Acknowledgment = codec::decode(&msg.payload).unwrap();
        assert_eq!(ack.status, AckStatus::Failed);
        assert_eq!(ack.error.as_deref(), Some("pin fault"));
    }

    #[test]
    fn test_ack_without_correlation_data() {
        let ctx = CorrelationContext::new(Some("replies/app-1".into()), None);
        let msg = CommandDispatcher::acknowledgment(&PulseResult::success(Action::Full), &ctx)
            .unwrap()
            .expect("ack expected");
        assert!(msg.correlation_data.is_none());
    }
}
