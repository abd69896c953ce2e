//! Error types for the relay binary.

/// Top-level error for the relay binary.
///
/// Each variant wraps a specific subsystem error, so `main` can
/// propagate any startup or shutdown failure with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ripstream_core::config::ConfigError,
    },

    /// The log store could not be reached or configured.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: ripstream_store::StoreError,
    },

    /// The HTTP gateway failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ripstream_gateway::ServerError,
    },

    /// The poller task panicked or was aborted.
    #[error("poller task failed: {source}")]
    Poller {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
