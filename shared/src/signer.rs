//! Request signer
//!
//! Signature = hex(HMAC-SHA256(secret, timestamp ++ path)), where the
//! timestamp is the exact RFC3339 string sent in `X-Timestamp`. The client
//! uses it to produce headers, the device uses it to recompute and compare.

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded signature for a request
pub fn sign(timestamp: &str, path: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("infallible: HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(path.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Format a timestamp the way it travels in `X-Timestamp`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the `(timestamp, signature)` header pair for `path` at time `at`
pub fn signed_headers(path: &str, secret: &str, at: DateTime<Utc>) -> (String, String) {
    let timestamp = format_timestamp(at);
    let signature = sign(&timestamp, path, secret);
    (timestamp, signature)
}
