//! Request authentication
//!
//! Two independent checks, each usable as axum middleware:
//! - static API key in `X-API-Key`
//! - HMAC signature in `X-Signature` over `X-Timestamp` + request path,
//!   accepted only while the timestamp is inside the freshness window
//!
//! The window bounds replay exposure without server-side nonce storage. A
//! captured request can still be replayed inside the window unless the
//! optional [`ReplayGuard`] is enabled.

mod authenticator;
mod middleware;
mod replay;

pub use authenticator::Authenticator;
pub use middleware::{require_api_key, require_signature};
pub use replay::ReplayGuard;

use thiserror::Error;

/// Why a request was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server has no credential to check against
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("timestamp is not RFC3339")]
    MalformedTimestamp,

    #[error("timestamp outside freshness window ({age_secs}s old)")]
    Stale { age_secs: i64 },

    #[error("signature mismatch")]
    BadSignature,

    #[error("API key mismatch")]
    BadApiKey,

    #[error("signature already used")]
    Replayed,
}
