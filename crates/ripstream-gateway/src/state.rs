//! Shared application state for the gateway.

use ripstream_core::RelayContext;
use tokio_util::sync::CancellationToken;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay components: store, hub, job tracker, ingest gate, control.
    pub relay: RelayContext,
    /// Cancelled when the process is shutting down. Live streams end on
    /// cancellation so graceful shutdown is not held open by them.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state over `relay` with a fresh shutdown token.
    pub fn new(relay: RelayContext) -> Self {
        Self::with_shutdown(relay, CancellationToken::new())
    }

    /// Create state over `relay` tied to an existing shutdown token.
    pub const fn with_shutdown(relay: RelayContext, shutdown: CancellationToken) -> Self {
        Self { relay, shutdown }
    }
}
