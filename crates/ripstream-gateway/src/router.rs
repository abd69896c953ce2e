//! Axum router construction for the gateway.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{control, handlers, sse, ws};

/// Build the complete Axum router.
///
/// The router includes:
/// - `POST /api/logs` -- ingest a log line
/// - `GET /api/logs` -- replay a topic (`?topic=`)
/// - `GET /api/logs/stream` -- SSE of ingest-topic records
/// - `GET /api/events` -- SSE of every watched topic
/// - `GET /ws/events` -- `WebSocket` of every watched topic
/// - `GET /api/jobs` -- list job views
/// - `GET /api/jobs/{id}` -- single job view
/// - `POST /api/jobs/{id}/pause` -- pause command
/// - `POST /api/jobs/{id}/cancel` -- cancel command
/// - `POST /api/services/{service}/toggle` -- toggle command
/// - `GET /health` -- liveness
///
/// CORS allows any origin so the dashboard can be served separately.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Logs
        .route(
            "/api/logs",
            post(handlers::ingest_log).get(handlers::replay_logs),
        )
        .route("/api/logs/stream", get(sse::log_stream))
        // Live push
        .route("/api/events", get(sse::event_stream))
        .route("/ws/events", get(ws::ws_events))
        // Jobs
        .route("/api/jobs", get(handlers::list_jobs))
        .route("/api/jobs/{id}", get(handlers::get_job))
        // Control
        .route("/api/jobs/{id}/pause", post(control::pause_job))
        .route("/api/jobs/{id}/cancel", post(control::cancel_job))
        .route("/api/services/{service}/toggle", post(control::toggle_service))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
