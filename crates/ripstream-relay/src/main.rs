//! Event relay binary for ripstream.
//!
//! Workers append events to topics in a `Dragonfly` stream store. This
//! binary consumes those topics, pushes every record to live viewers over
//! SSE and `WebSocket`, tracks job state, and accepts producer log lines
//! and operator control commands over HTTP.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `ripstream.yaml` (or `RIPSTREAM_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the log store
//! 4. Build the relay context
//! 5. Spawn the multi-topic poller
//! 6. Serve HTTP until Ctrl-C, then stop the poller

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use ripstream_core::config::{LogFormat, LoggingConfig, StoreBackend, StoreConfig};
use ripstream_core::{ConfigSource, RelayConfig, RelayContext};
use ripstream_gateway::{start_server, AppState};
use ripstream_store::{DragonflyLog, LogStore, MemoryLog};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Environment variable naming the configuration file.
const CONFIG_PATH_VAR: &str = "RIPSTREAM_CONFIG";

/// Configuration file used when [`CONFIG_PATH_VAR`] is unset.
const DEFAULT_CONFIG_PATH: &str = "ripstream.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the store connection, or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config_path = std::env::var(CONFIG_PATH_VAR)
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, source) = RelayConfig::load(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    if source == ConfigSource::Defaults {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        config = %config_path.display(),
        port = config.server.port,
        ingest_topic = config.ingest.topic,
        min_level = %config.ingest.min_level,
        start = ?config.poller.start,
        "ripstream-relay starting"
    );

    // 3. Connect to the log store.
    let store = connect_store(&config.store).await?;

    // 4. Build the relay context.
    let relay = RelayContext::new(&config, store);
    info!(topics = relay.watched_topics().len(), "Relay context ready");

    // 5. Spawn the poller.
    let shutdown = CancellationToken::new();
    let poller = relay.poller().spawn(shutdown.child_token());

    // 6. Serve until Ctrl-C.
    tokio::spawn(wait_for_signal(shutdown.clone()));
    let state = Arc::new(AppState::with_shutdown(relay, shutdown.clone()));
    let served = start_server(&config.server, state).await;

    shutdown.cancel();
    let stats = poller.await?;
    info!(
        reads = stats.reads,
        failures = stats.failures,
        dispatched = stats.dispatched,
        "ripstream-relay stopped"
    );
    served.map_err(AppError::from)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn LogStore>, AppError> {
    match config.backend {
        StoreBackend::Dragonfly => {
            info!(url = config.url, "Connecting to Dragonfly");
            let store = DragonflyLog::connect(&config.url).await?;
            info!("Dragonfly connected");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory log store; records will not survive a restart");
            Ok(Arc::new(MemoryLog::new()))
        }
    }
}

async fn wait_for_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
    }
}
