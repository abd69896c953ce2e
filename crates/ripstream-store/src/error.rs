//! Error types for the log store.
//!
//! All store failures are reported as [`StoreError`]. Callers treat every
//! variant as transient except [`StoreError::Config`].

use ripstream_types::ParseRecordIdError;

/// Errors that can occur talking to the log store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("log store unavailable: {0}")]
    Unavailable(String),

    /// A `Dragonfly`/Redis command failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// The store returned an id that is not `<ms>-<seq>`.
    #[error("malformed id from store: {0}")]
    MalformedId(#[from] ParseRecordIdError),

    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
