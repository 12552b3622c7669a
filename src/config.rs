//! Command-line and environment configuration
//!
//! Every setting can come from a flag or its environment variable, flag
//! first. Empty values count as absent.

use crate::auth::Authenticator;
use crate::error::GateError;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

const PLAIN_PORT: u16 = 1883;
const TLS_PORT: u16 = 8883;

/// How HTTP requests are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// `X-Timestamp` + `X-Signature` over the request path
    Hmac,
    /// Static key in `X-API-Key`
    ApiKey,
}

/// Which actuator backend drives the lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActuatorKind {
    /// Raspberry Pi GPIO
    Hardware,
    /// Log transitions only
    Mock,
}

#[derive(Parser, Debug)]
#[command(name = "gate-remote", version, about = "Gate opener daemon")]
pub struct Cli {
    /// HTTP listen address
    #[arg(long = "listen", env = "GATE_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// HTTP authentication scheme
    #[arg(long, env = "GATE_AUTH_MODE", value_enum, default_value_t = AuthMode::Hmac)]
    pub auth_mode: AuthMode,

    /// Actuator backend
    #[arg(long, env = "GATE_ACTUATOR", value_enum, default_value_t = ActuatorKind::Hardware)]
    pub actuator: ActuatorKind,

    /// Shared HMAC secret
    #[arg(long, env = "GATE_API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Static API key
    #[arg(long, env = "GATE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Refuse a signature seen before inside the freshness window
    #[arg(long, env = "GATE_REJECT_REPLAYS")]
    pub reject_replays: bool,

    /// Broker URL, e.g. mqtts://broker.example.com:8883
    #[arg(long, env = "MQTT_BROKER")]
    pub mqtt_broker: Option<String>,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "gate-remote")]
    pub mqtt_client_id: String,
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub client_id: String,
    pub username: String,
    pub password: String,
}

/// Validated device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub listen: SocketAddr,
    pub auth_mode: AuthMode,
    pub actuator: ActuatorKind,
    pub api_secret: Option<String>,
    pub api_key: Option<String>,
    pub reject_replays: bool,
    /// `None` runs HTTP only
    pub mqtt: Option<MqttConfig>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl DeviceConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, GateError> {
        let api_secret = non_empty(cli.api_secret);
        let api_key = non_empty(cli.api_key);

        match cli.auth_mode {
            AuthMode::Hmac if api_secret.is_none() => {
                return Err(GateError::Configuration(
                    "GATE_API_SECRET is required in hmac mode".into(),
                ))
            }
            AuthMode::ApiKey if api_key.is_none() => {
                return Err(GateError::Configuration(
                    "GATE_API_KEY is required in api-key mode".into(),
                ))
            }
            _ => {}
        }

        let mqtt = match non_empty(cli.mqtt_broker) {
            Some(broker) => {
                let (host, port, tls) = parse_broker_url(&broker)?;
                let (Some(username), Some(password)) =
                    (non_empty(cli.mqtt_username), non_empty(cli.mqtt_password))
                else {
                    return Err(GateError::Configuration(
                        "MQTT_USERNAME and MQTT_PASSWORD are required when MQTT_BROKER is set"
                            .into(),
                    ));
                };
                let client_id = non_empty(Some(cli.mqtt_client_id))
                    .unwrap_or_else(|| "gate-remote".to_string());

                Some(MqttConfig {
                    host,
                    port,
                    tls,
                    client_id,
                    username,
                    password,
                })
            }
            None => None,
        };

        Ok(Self {
            listen: cli.listen,
            auth_mode: cli.auth_mode,
            actuator: cli.actuator,
            api_secret,
            api_key,
            reject_replays: cli.reject_replays,
            mqtt,
        })
    }

    /// Build the request authenticator for these credentials
    pub fn authenticator(&self) -> Authenticator {
        let auth = Authenticator::new(self.api_secret.clone(), self.api_key.clone());
        if self.reject_replays {
            auth.with_replay_guard()
        } else {
            auth
        }
    }
}

/// Split a broker URL into host, port and whether TLS is used
///
/// A URL without a scheme is treated as plain TCP.
pub fn parse_broker_url(url: &str) -> Result<(String, u16, bool), GateError> {
    let invalid =
        |why: &str| GateError::Configuration(format!("invalid MQTT_BROKER {url:?}: {why}"));

    let (scheme, rest) = url.split_once("://").unwrap_or(("tcp", url));
    let tls = match scheme.to_ascii_lowercase().as_str() {
        "tcp" | "mqtt" => false,
        "ssl" | "mqtts" | "tls" => true,
        _ => return Err(invalid("unsupported scheme")),
    };

    let authority = rest.trim_end_matches('/');
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
            (host, port)
        }
        None => (authority, if tls { TLS_PORT } else { PLAIN_PORT }),
    };

    if host.is_empty() || host.contains('/') {
        return Err(invalid("missing host"));
    }

    Ok((host.to_string(), port, tls))
}
