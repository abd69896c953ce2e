//! REST endpoint handlers for the gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/logs` | Ingest one producer log line |
//! | `GET` | `/api/logs` | Replay a topic's retained records |
//! | `GET` | `/api/jobs` | List reconstructed job views |
//! | `GET` | `/api/jobs/{id}` | Get one job view |
//! | `GET` | `/health` | Liveness and subscriber count |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use ripstream_core::ingest::IngestOutcome;
use ripstream_types::{JobView, LogRecord};
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::state::AppState;

/// Header a producer may use to attribute a line to a job.
pub const JOB_ID_HEADER: &str = "x-job-id";

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the `GET /api/logs` endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct ReplayQuery {
    /// Topic to replay. Defaults to the ingest topic.
    pub topic: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /api/logs
// ---------------------------------------------------------------------------

/// Ingest one JSON log line.
///
/// Lines below the minimum severity answer `{"status":"filtered"}` and
/// are not stored. Admitted lines answer `{"status":"logged","id":...}`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the body is not a JSON
/// object, or [`GatewayError::Store`] if the append fails.
pub async fn ingest_log(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let line: Value = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed JSON: {e}")))?;
    let header_job_id = headers
        .get(JOB_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let outcome = state.relay.ingestor.ingest(&line, header_job_id).await?;
    let body = match outcome {
        IngestOutcome::Filtered => json!({ "status": "filtered" }),
        IngestOutcome::Logged(id) => json!({ "status": "logged", "id": id.to_string() }),
    };
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// GET /api/logs
// ---------------------------------------------------------------------------

/// Return every retained record of a topic, oldest first.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an empty topic name, or
/// [`GatewayError::Store`] if the range read fails.
pub async fn replay_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReplayQuery>,
) -> Result<Json<Vec<LogRecord>>, GatewayError> {
    let topic = query
        .topic
        .unwrap_or_else(|| state.relay.ingest_topic().to_owned());
    if topic.is_empty() {
        return Err(GatewayError::InvalidRequest("topic must not be empty".to_owned()));
    }
    let records = state.relay.replay(&topic).await?;
    Ok(Json(records))
}

// ---------------------------------------------------------------------------
// GET /api/jobs
// ---------------------------------------------------------------------------

/// List every tracked job, ordered by job id.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobView>> {
    Json(state.relay.jobs.views().await)
}

/// Get one job.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the job is not tracked.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, GatewayError> {
    state
        .relay
        .jobs
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("job {job_id} not found")))
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness check.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "subscribers": state.relay.hub.subscriber_count(),
    }))
}
