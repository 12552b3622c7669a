//! Gate Remote Shared Types
//!
//! This crate provides the wire types, JSON codec and request signer shared
//! between the gate device daemon and the command-line client.

pub mod codec;
pub mod signer;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timing parameters for the system
pub mod timing {
    /// How long an actuator is held high for one pulse
    pub const PULSE_DURATION_MS: u64 = 1000;

    /// Heartbeat interval in milliseconds
    pub const HEARTBEAT_INTERVAL_MS: u64 = 60_000;

    /// Maximum age (either direction) of a signed timestamp
    pub const FRESHNESS_WINDOW_SECS: i64 = 5 * 60;
}

/// MQTT topic names and quality of service
pub mod topics {
    /// Topic the device subscribes to for commands
    pub const GATE_CONTROL: &str = "gate/control";

    /// Topic the device publishes heartbeats to
    pub const GATE_STATUS: &str = "gate/status";

    /// QoS level used for every subscribe and publish (at least once)
    pub const QOS_LEVEL: u8 = 1;
}

/// HTTP header names used by the request signing scheme
pub mod headers {
    pub const API_KEY: &str = "X-API-Key";
    pub const TIMESTAMP: &str = "X-Timestamp";
    pub const SIGNATURE: &str = "X-Signature";
}

/// One of the four gate buttons the device can press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Open the gate fully
    Full,
    /// Open the gate for pedestrians
    Pedestrian,
    /// Inner right nudge
    Right,
    /// Inner left nudge
    Left,
}

impl Action {
    /// Every action, in pin-table order
    pub const ALL: [Action; 4] = [Action::Full, Action::Pedestrian, Action::Right, Action::Left];

    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Full => "full",
            Action::Pedestrian => "pedestrian",
            Action::Right => "right",
            Action::Left => "left",
        }
    }

    /// Position of the action in [`Action::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Action::Full => 0,
            Action::Pedestrian => 1,
            Action::Right => 2,
            Action::Left => 3,
        }
    }

    /// HTTP path that triggers this action
    pub fn http_path(&self) -> String {
        format!("/api/gate/{}", self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an action name is not one of the four known buttons
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Action::Full),
            "pedestrian" => Ok(Action::Pedestrian),
            "right" => Ok(Action::Right),
            "left" => Ok(Action::Left),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Command payload as it arrives on `gate/control`
///
/// The action stays a plain string here; validation into an [`Action`]
/// happens in the dispatcher so an unknown name can still be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCommand {
    pub action: String,
}

impl GateCommand {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

/// Outcome reported in an acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Failed,
}

/// Acknowledgment published to a command's response topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub status: AckStatus,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builder helpers for acknowledgments
impl Acknowledgment {
    /// Create an ACK for a completed pulse
    pub fn success(action: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            action: action.into(),
            error: None,
        }
    }

    /// Create an ACK for a failed pulse
    pub fn failed(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Failed,
            action: action.into(),
            error: Some(error.into()),
        }
    }
}

/// Liveness message published to `gate/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(rename = "hb")]
    pub heartbeat: String,
}

impl Heartbeat {
    /// Create a heartbeat stamped with the current UTC time
    pub fn now() -> Self {
        Self {
            heartbeat: signer::format_timestamp(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert_eq!(
            "bogus".parse::<Action>(),
            Err(UnknownAction("bogus".into()))
        );
        // Names are case sensitive on the wire
        assert!("Full".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_index_matches_table() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(action.index(), i);
        }
    }

    #[test]
    fn test_http_path() {
        assert_eq!(Action::Pedestrian.http_path(), "/api/gate/pedestrian");
    }

    #[test]
    fn test_ack_creation() {
        let ack = Acknowledgment::success("full");
        assert_eq!(ack.status, AckStatus::Success);
        assert!(ack.error.is_none());

        let ack = Acknowledgment::failed("left", "pin fault");
        assert_eq!(ack.status, AckStatus::Failed);
        assert_eq!(ack.error.as_deref(), Some("pin fault"));
    }

    #[test]
    fn test_heartbeat_creation() {
        let hb = Heartbeat::now();
        assert!(hb.heartbeat.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&hb.heartbeat).is_ok());
    }
}
