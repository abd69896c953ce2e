//! Error types for the gateway.
//!
//! [`GatewayError`] maps every failure onto a status code and a JSON
//! `{"error", "status"}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ripstream_core::RelayError;
use ripstream_store::StoreError;
use tracing::error;

/// Errors that can occur in the gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request body, path, or query was rejected.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The log store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<RelayError> for GatewayError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Store(e) => Self::Store(e),
            RelayError::InvalidCommand(msg) | RelayError::InvalidPayload(msg) => {
                Self::InvalidRequest(msg)
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Store(e) => {
                error!(error = %e, "Log store request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
