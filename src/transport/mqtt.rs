//! MQTT v5 command surface
//!
//! One session per process. The event loop runs on its own task, resubscribes
//! to the control topic on every ConnAck and hands each inbound publish to the
//! [`ControlMessageHandler`] on a fresh task, so a 1 s pulse never stalls
//! keep-alives or other commands. Reconnection is driven by polling the event
//! loop again after a backoff.

use super::traits::{OutboundMessage, Publisher};
use crate::command::{CommandDispatcher, CorrelationContext};
use crate::config::MqttConfig;
use crate::error::GateError;
use async_trait::async_trait;
use bytes::Bytes;
use gate_shared::{codec, topics};
use rumqttc::v5::mqttbytes::v5::{ConnectProperties, Packet, Publish, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, ClientError, Event, EventLoop, MqttOptions};
use rumqttc::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(20);
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
/// How long shutdown waits for the disconnect to reach the broker
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);
const REQUEST_CHANNEL_CAPACITY: usize = 32;
const SESSION_EXPIRY_SECS: u32 = 60;

/// The QoS every subscription and publish uses
fn qos() -> QoS {
    match topics::QOS_LEVEL {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// An inbound publish, detached from the client library's packet type
#[derive(Debug, Clone)]
pub struct InboundCommand {
    pub topic: String,
    pub payload: Bytes,
    pub correlation: CorrelationContext,
}

impl InboundCommand {
    fn from_publish(publish: Publish) -> Self {
        let (response_topic, correlation_data) = match publish.properties {
            Some(props) => (props.response_topic, props.correlation_data),
            None => (None, None),
        };

        Self {
            topic: String::from_utf8_lossy(&publish.topic).into_owned(),
            payload: publish.payload,
            correlation: CorrelationContext::new(response_topic, correlation_data),
        }
    }
}

/// Handles control-topic messages, with or without a reply address
pub struct ControlMessageHandler {
    dispatcher: Arc<CommandDispatcher>,
    publisher: Arc<dyn Publisher>,
}

impl ControlMessageHandler {
    pub fn new(dispatcher: Arc<CommandDispatcher>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            dispatcher,
            publisher,
        }
    }

    /// Decode, dispatch, and acknowledge when a response topic was given
    ///
    /// Undecodable payloads are logged and dropped without an acknowledgment.
    pub async fn handle(&self, message: InboundCommand) {
        if message.topic != topics::GATE_CONTROL {
            debug!("[MQTT] Ignoring message on {}", message.topic);
            return;
        }

        let command = match codec::decode_command(&message.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("[MQTT] Dropping undecodable command: {}", e);
                return;
            }
        };

        let result = self.dispatcher.dispatch(&command, &message.correlation).await;

        let ack = match CommandDispatcher::acknowledgment(&result, &message.correlation) {
            Ok(Some(ack)) => ack,
            Ok(None) => return,
            Err(e) => {
                error!("[MQTT] Failed to encode acknowledgment: {}", e);
                return;
            }
        };

        let topic = ack.topic.clone();
        match self.publisher.publish(ack).await {
            Ok(()) => debug!("[MQTT] Ack for {} sent to {}", result.action, topic),
            Err(e) => warn!("[MQTT] Failed to send ack to {}: {}", topic, e),
        }
    }
}

/// Publishes through the session's client at the fixed QoS
///
/// Requests are queued without waiting. While the broker is unreachable the
/// event loop stops draining the request channel; once it is full a publish
/// fails immediately instead of blocking its caller.
pub struct MqttPublisher {
    client: AsyncClient,
}

fn transport_error(what: &str, err: ClientError) -> GateError {
    match err {
        ClientError::TryRequest(_) => {
            GateError::Transport(format!("{what} dropped: request queue full"))
        }
        other => GateError::Transport(format!("{what} failed: {other}")),
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), GateError> {
        let OutboundMessage {
            topic,
            payload,
            correlation_data,
        } = message;

        let queued = match correlation_data {
            Some(correlation_data) => {
                let properties = PublishProperties {
                    correlation_data: Some(correlation_data),
                    ..Default::default()
                };
                self.client
                    .try_publish_with_properties(topic, qos(), false, payload, properties)
            }
            None => self.client.try_publish(topic, qos(), false, payload),
        };
        queued.map_err(|e| transport_error("publish", e))
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// A running broker session
pub struct MqttSession {
    client: AsyncClient,
    publisher: Arc<MqttPublisher>,
    stopping: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl MqttSession {
    /// Configure the client and start the event loop task
    ///
    /// Returns immediately; the first connection attempt happens on the task.
    pub fn start(config: &MqttConfig, dispatcher: Arc<CommandDispatcher>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_credentials(&config.username, &config.password);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_start(true);
        options.set_connect_properties(ConnectProperties {
            session_expiry_interval: Some(SESSION_EXPIRY_SECS),
            ..ConnectProperties::new()
        });
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let publisher = Arc::new(MqttPublisher {
            client: client.clone(),
        });
        let handler = Arc::new(ControlMessageHandler::new(dispatcher, publisher.clone()));
        let stopping = Arc::new(AtomicBool::new(false));

        info!(
            "[MQTT] Connecting to {}:{} as {} (tls: {})",
            config.host, config.port, config.client_id, config.tls
        );

        let handler_loop = MqttHandler::new(client.clone(), handler, stopping.clone());
        let task = tokio::spawn(handler_loop.run(eventloop));

        Self {
            client,
            publisher,
            stopping,
            task,
        }
    }

    /// Publisher bound to this session
    pub fn publisher(&self) -> Arc<dyn Publisher> {
        self.publisher.clone()
    }

    /// Disconnect from the broker and stop the event loop
    pub async fn shutdown(mut self) {
        self.stopping.store(true, Ordering::SeqCst);

        if let Err(e) = self.client.try_disconnect() {
            warn!("[MQTT] {}", transport_error("disconnect", e));
        }

        if tokio::time::timeout(DISCONNECT_GRACE, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
        info!("[MQTT] Session closed");
    }
}

/// Double the reconnect delay, capped at [`MAX_RECONNECT_DELAY`]
fn next_reconnect_delay(current: Duration) -> Duration {
    std::cmp::min(current * 2, MAX_RECONNECT_DELAY)
}

/// State owned by the event loop task
struct MqttHandler {
    client: AsyncClient,
    handler: Arc<ControlMessageHandler>,
    stopping: Arc<AtomicBool>,
    /// First successful connection has been reported
    connection_logged: bool,
    reconnect_delay: Duration,
}

impl MqttHandler {
    fn new(
        client: AsyncClient,
        handler: Arc<ControlMessageHandler>,
        stopping: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            handler,
            stopping,
            connection_logged: false,
            reconnect_delay: INITIAL_RECONNECT_DELAY,
        }
    }

    async fn run(mut self, mut eventloop: EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.on_connected();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let handler = self.handler.clone();
                    let message = InboundCommand::from_publish(publish);
                    tokio::spawn(async move { handler.handle(message).await });
                }
                Ok(_) => {}
                Err(e) => {
                    if self.stopping.load(Ordering::SeqCst) {
                        break;
                    }
                    let delay = self.on_connection_error();
                    warn!("[MQTT] Connection error: {} (retrying in {:?})", e, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        info!("[MQTT] Event loop stopped");
    }

    /// Reset the backoff and resubscribe. Returns whether the subscribe
    /// request was queued.
    fn on_connected(&mut self) -> bool {
        self.reconnect_delay = INITIAL_RECONNECT_DELAY;

        if self.connection_logged {
            info!("[MQTT] Reconnected");
        } else {
            info!("[MQTT] Connected");
            self.connection_logged = true;
        }

        // Clean start drops subscriptions, so subscribe on every ConnAck
        match self.client.try_subscribe(topics::GATE_CONTROL, qos()) {
            Ok(()) => {
                info!("[MQTT] Subscribed to {}", topics::GATE_CONTROL);
                true
            }
            Err(e) => {
                error!("[MQTT] Subscribe to {} failed: {}", topics::GATE_CONTROL, e);
                false
            }
        }
    }

    /// Delay to wait before the next poll; advances the backoff
    fn on_connection_error(&mut self) -> Duration {
        let delay = self.reconnect_delay;
        self.reconnect_delay = next_reconnect_delay(delay);
        delay
    }
}
