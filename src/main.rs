mod auth;
mod command;
mod config;
mod error;
mod gpio;
mod liveness;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use command::CommandDispatcher;
use config::{ActuatorKind, Cli, DeviceConfig};
use error::GateError;
use gpio::{ActuationController, Actuator, MockActuator};
use liveness::{LivenessHandle, LivenessReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use transport::{http, MqttSession};

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = DeviceConfig::from_cli(Cli::parse())?;

    info!("Gate device starting");
    info!("  HTTP: {} ({:?} auth)", config.listen, config.auth_mode);
    match &config.mqtt {
        Some(mqtt) => info!("  MQTT: {}:{} as {}", mqtt.host, mqtt.port, mqtt.client_id),
        None => info!("  MQTT: disabled"),
    }
    if config.reject_replays {
        info!("  Replay guard enabled");
    }

    let actuator = build_actuator(config.actuator)?;
    let controller = ActuationController::new(actuator)?;
    let dispatcher = Arc::new(CommandDispatcher::new(controller.clone()));
    let auth = Arc::new(config.authenticator());
    info!(
        "  Actuator: {} | secret: {} | api key: {}",
        controller.backend(),
        if auth.has_secret() { "set" } else { "unset" },
        if auth.has_api_key() { "set" } else { "unset" }
    );

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    // Broker session and heartbeat, when a broker is configured
    let mqtt = config
        .mqtt
        .as_ref()
        .map(|mqtt| MqttSession::start(mqtt, dispatcher.clone()));
    let liveness = mqtt
        .as_ref()
        .map(|session| LivenessReporter::new(session.publisher()).start());

    // Heartbeat and broker go down before the HTTP server drains
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutting down");
        stop_background(liveness, mqtt).await;
    };

    let router = http::build_router(dispatcher, auth, config.auth_mode);
    let served = http::serve(listener, router, shutdown).await;

    controller.shutdown();
    served
}

/// Upper bound on heartbeat and broker teardown at exit
const TEARDOWN_GRACE: Duration = Duration::from_secs(15);

/// Stop the heartbeat, then the broker session. Gives up after
/// [`TEARDOWN_GRACE`] so the line cleanup always runs.
async fn stop_background(liveness: Option<LivenessHandle>, mqtt: Option<MqttSession>) {
    let teardown = async {
        if let Some(liveness) = liveness {
            liveness.stop().await;
        }
        if let Some(session) = mqtt {
            session.shutdown().await;
        }
    };

    if tokio::time::timeout(TEARDOWN_GRACE, teardown).await.is_err() {
        warn!("Background teardown timed out after {:?}", TEARDOWN_GRACE);
    }
}

fn build_actuator(kind: ActuatorKind) -> Result<Arc<dyn Actuator>, GateError> {
    match kind {
        ActuatorKind::Mock => {
            warn!("[GPIO] Mock actuator selected: no pins will be driven");
            Ok(Arc::new(MockActuator::new()))
        }
        #[cfg(feature = "rpi")]
        ActuatorKind::Hardware => Ok(Arc::new(gpio::RpiActuator::new()?)),
        #[cfg(not(feature = "rpi"))]
        ActuatorKind::Hardware => Err(GateError::Configuration(
            "hardware actuator requested but built without the `rpi` feature".into(),
        )),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
