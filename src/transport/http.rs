//! HTTP command surface
//!
//! `GET /api/gate/{action}` behind whichever auth layer the device runs with.
//! The handler waits for the full pulse before answering.

use crate::auth::{require_api_key, require_signature, Authenticator};
use crate::command::{CommandDispatcher, CorrelationContext};
use crate::config::AuthMode;
use crate::error::GateError;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use gate_shared::{Action, GateCommand};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<CommandDispatcher>,
}

/// Build the command router with the auth layer for `mode`
pub fn build_router(
    dispatcher: Arc<CommandDispatcher>,
    auth: Arc<Authenticator>,
    mode: AuthMode,
) -> Router {
    let routes = Router::new().route("/api/gate/{action}", get(gate_action));

    let routes = match mode {
        AuthMode::Hmac => {
            routes.route_layer(middleware::from_fn_with_state(auth, require_signature))
        }
        AuthMode::ApiKey => {
            routes.route_layer(middleware::from_fn_with_state(auth, require_api_key))
        }
    };

    routes.with_state(AppState { dispatcher })
}

async fn gate_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
) -> Result<Response, GateError> {
    let action: Action = action.parse()?;

    let result = state
        .dispatcher
        .dispatch(&GateCommand::new(action.as_str()), &CorrelationContext::none())
        .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(result.to_acknowledgment())).into_response())
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("[HTTP] Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("[HTTP] Server stopped");
    Ok(())
}
