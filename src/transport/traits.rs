//! Publisher abstraction for the pub/sub side of the device

use crate::error::GateError;
use async_trait::async_trait;
use bytes::Bytes;

/// A message on its way to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Bytes,
    /// Echoed back on acknowledgments so the requester can match them up
    pub correlation_data: Option<Bytes>,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            payload,
            correlation_data: None,
        }
    }

    pub fn with_correlation(mut self, correlation_data: Option<Bytes>) -> Self {
        self.correlation_data = correlation_data;
        self
    }
}

/// Something that can publish to the broker
///
/// Shared between the command handlers (acknowledgments) and the liveness
/// reporter (heartbeats), so implementations must accept concurrent calls.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish at the fixed QoS level
    async fn publish(&self, message: OutboundMessage) -> Result<(), GateError>;

    /// Human-readable name for this publisher
    fn name(&self) -> &'static str;
}
