//! Axum middleware wrapping [`Authenticator`] checks
//!
//! Missing headers are checked as empty strings so they fail like any other
//! bad credential. A server without the credential configured answers 500,
//! never 401 and never a pass-through.

use super::{AuthError, Authenticator};
use crate::error::GateError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gate_shared::headers;
use std::sync::Arc;
use tracing::{error, warn};

fn header_value(req: &Request, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn reject(path: &str, err: AuthError) -> Response {
    match &err {
        AuthError::NotConfigured(what) => {
            error!("[AUTH] {} refused: {} is not configured", path, what)
        }
        other => warn!("[AUTH] {} rejected: {}", path, other),
    }
    GateError::from(err).into_response()
}

/// Require a valid `X-Timestamp` + `X-Signature` pair for the request path
pub async fn require_signature(
    State(auth): State<Arc<Authenticator>>,
    req: Request,
    next: Next,
) -> Response {
    let timestamp = header_value(&req, headers::TIMESTAMP);
    let signature = header_value(&req, headers::SIGNATURE);
    let path = req.uri().path().to_string();

    match auth.check_signature(&timestamp, &signature, &path) {
        Ok(()) => next.run(req).await,
        Err(e) => reject(&path, e),
    }
}

/// Require the configured static key in `X-API-Key`
pub async fn require_api_key(
    State(auth): State<Arc<Authenticator>>,
    req: Request,
    next: Next,
) -> Response {
    let provided = header_value(&req, headers::API_KEY);
    let path = req.uri().path().to_string();

    match auth.check_api_key(&provided) {
        Ok(()) => next.run(req).await,
        Err(e) => reject(&path, e),
    }
}
