//! Error types for the relay core.

use ripstream_store::StoreError;

/// Errors surfaced to callers of relay operations.
///
/// Severity filtering is not an error; it is reported as an outcome by
/// [`crate::ingest::Ingestor`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The log store rejected or could not serve the request.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A control command target failed validation. Nothing was appended.
    #[error("invalid control command: {0}")]
    InvalidCommand(String),

    /// A producer payload was not a JSON object.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
