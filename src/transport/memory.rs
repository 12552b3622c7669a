//! Publisher that keeps messages in memory

use super::traits::{OutboundMessage, Publisher};
use crate::error::GateError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<OutboundMessage>>,
    offline: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every publish until set back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, topic: &str) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), GateError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GateError::Transport("broker unreachable".into()));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
