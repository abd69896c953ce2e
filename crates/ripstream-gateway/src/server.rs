//! Gateway HTTP server lifecycle.
//!
//! [`start_server`] binds the configured address and serves until the
//! state's shutdown token is cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use ripstream_core::config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Start the gateway HTTP server.
///
/// Returns `Ok(())` once `state.shutdown` is cancelled and in-flight
/// requests have drained. Live streams end on the same token.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Gateway stopped");
    Ok(())
}

/// Errors that can occur when starting or running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
