//! Operator control endpoints.
//!
//! Each request appends exactly one record to the control topic. Targets
//! are validated first; a rejected target appends nothing.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/api/jobs/{id}/pause` | `{"status":"paused","jobId":id}` |
//! | `POST` | `/api/jobs/{id}/cancel` | `{"status":"canceled","jobId":id}` |
//! | `POST` | `/api/services/{service}/toggle` | `{"status":"toggled","service":name}` |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::state::AppState;

/// Ask workers to pause a job.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed job id, or
/// [`GatewayError::Store`] if the append fails.
pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state.relay.control.pause(&job_id).await?;
    Ok(Json(json!({ "status": "paused", "jobId": job_id })))
}

/// Ask workers to cancel a job.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed job id, or
/// [`GatewayError::Store`] if the append fails.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state.relay.control.cancel(&job_id).await?;
    Ok(Json(json!({ "status": "canceled", "jobId": job_id })))
}

/// Ask a service to flip its enabled state.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed service name,
/// or [`GatewayError::Store`] if the append fails.
pub async fn toggle_service(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state.relay.control.toggle(&service).await?;
    Ok(Json(json!({ "status": "toggled", "service": service })))
}
