//! Error taxonomy for the gate daemon
//!
//! Every failure a request can hit maps onto one variant here, and each
//! variant onto one HTTP status class.

use crate::auth::AuthError;
use crate::gpio::ActuatorError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gate_shared::codec::CodecError;
use gate_shared::UnknownAction;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// Missing secret, key or broker credentials
    #[error("server configuration error: {0}")]
    Configuration(String),

    /// Bad key, bad or stale signature, unparsable timestamp
    #[error("unauthorized: {0}")]
    Authentication(AuthError),

    /// Malformed command payload
    #[error("malformed command: {0}")]
    Decode(#[from] CodecError),

    /// Well-formed command naming no known button
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    /// Pin transition failed
    #[error("actuation failed: {0}")]
    Actuation(#[from] ActuatorError),

    /// Broker publish/subscribe or connection failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GateError::Decode(_) => StatusCode::BAD_REQUEST,
            GateError::UnknownAction(_) => StatusCode::NOT_FOUND,
            GateError::Actuation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured(what) => {
                GateError::Configuration(format!("{} is not configured", what))
            }
            other => GateError::Authentication(other),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        // Never echo credential details back to the caller
        let message = match &self {
            GateError::Configuration(_) => "server configuration error".to_string(),
            GateError::Authentication(_) => "unauthorized".to_string(),
            other => other.to_string(),
        };
        let body = serde_json::json!({ "error": message });
        (self.status_code(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_split_by_class() {
        let missing: GateError = AuthError::NotConfigured("GATE_API_SECRET").into();
        assert_eq!(missing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad: GateError = AuthError::BadSignature.into();
        assert_eq!(bad.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_action_status() {
        let err: GateError = UnknownAction("bogus".into()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "unknown action: bogus");
    }
}
