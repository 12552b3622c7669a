//! JSON codec for MQTT payloads
//!
//! Every message on the broker is a single JSON object per publish:
//! ```text
//! gate/control   {"action": "pedestrian"}
//! gate/status    {"hb": "2024-01-01T12:00:00Z"}
//! <reply topic>  {"status": "success", "action": "pedestrian"}
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::GateCommand;

/// Maximum payload size (4 KiB); commands are a few dozen bytes
pub const MAX_PAYLOAD_SIZE: usize = 4 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Payload too large: {0} bytes (max: {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),

    #[error("Empty payload")]
    Empty,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message into a JSON payload
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(message)?;

    if buf.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(buf.len()));
    }

    Ok(Bytes::from(buf))
}

/// Decode a JSON payload into a message
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    if payload.is_empty() {
        return Err(CodecError::Empty);
    }
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }

    Ok(serde_json::from_slice(payload)?)
}

/// Decode a `gate/control` payload
pub fn decode_command(payload: &[u8]) -> Result<GateCommand, CodecError> {
    decode(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Acknowledgment, Heartbeat};

    #[test]
    fn test_decode_command() {
        let cmd = decode_command(br#"{"action":"pedestrian"}"#).expect("decode failed");
        assert_eq!(cmd.action, "pedestrian");
    }

    #[test]
    fn test_decode_keeps_unknown_action() {
        // Validation happens later, the codec only checks shape
        let cmd = decode_command(br#"{"action":"bogus"}"#).expect("decode failed");
        assert_eq!(cmd.action, "bogus");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode_command(b"not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode_command(br#"{"verb":"full"}"#), Err(CodecError::Json(_))));
        assert!(matches!(decode_command(b""), Err(CodecError::Empty)));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![b' '; MAX_PAYLOAD_SIZE + 1];
        let result = decode_command(&payload);
        assert!(matches!(result, Err(CodecError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_ack_wire_format() {
        let ok = encode(&Acknowledgment::success("full")).expect("encode failed");
        assert_eq!(&ok[..], br#"{"status":"success","action":"full"}"#);

        let failed = encode(&Acknowledgment::failed("left", "pin fault")).expect("encode failed");
        assert_eq!(
            &failed[..],
            br#"{"status":"failed","action":"left","error":"pin fault"}"#
        );
    }

    #[test]
    fn test_heartbeat_wire_format() {
        let hb = Heartbeat {
            heartbeat: "2024-01-01T12:00:00Z".into(),
        };
        let encoded = encode(&hb).expect("encode failed");
        assert_eq!(&encoded[..], br#"{"hb":"2024-01-01T12:00:00Z"}"#);
    }
}
