//! Command transports: HTTP requests and MQTT control messages

pub mod http;
#[cfg(test)]
pub mod memory;
pub mod mqtt;
pub mod traits;

pub use mqtt::MqttSession;
pub use traits::{OutboundMessage, Publisher};
