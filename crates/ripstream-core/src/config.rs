//! Configuration loading and typed config structures for the relay.
//!
//! The configuration lives in `ripstream.yaml`. Every section and field
//! has a default, so an absent file or a partial file is valid. A few
//! deployment variables override the file:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `REDIS_URL` | `store.url` |
//! | `LOG_LEVEL` | `ingest.min_level` |
//! | `REDIS_LOG_STREAM` | `ingest.topic` |
//! | `PORT` | `server.port` |

use std::path::Path;
use std::time::Duration;

use ripstream_store::{Position, ReadOptions};
use ripstream_types::{RecordId, Severity};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration, mirroring `ripstream.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Producer log ingestion.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Multi-topic poller.
    #[serde(default)]
    pub poller: PollerConfig,

    /// Job state reconstruction.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Control command publishing.
    #[serde(default)]
    pub control: ControlConfig,

    /// Process logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded [`RelayConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the YAML file.
    File,
    /// The file was missing; built-in defaults were used.
    Defaults,
}

impl RelayConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist, then apply environment overrides.
    ///
    /// The returned [`ConfigSource`] reports whether the file was read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read,
    /// parsed, or validated.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        let (mut config, source) = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            (serde_yml::from_str(&contents)?, ConfigSource::File)
        } else {
            (Self::default(), ConfigSource::Defaults)
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok((config, source))
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply deployment overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("REDIS_URL") {
            self.store.url = url;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.ingest.min_level = Severity::resolve(Some(&level));
        }
        if let Some(topic) = lookup("REDIS_LOG_STREAM") {
            self.ingest.topic = topic;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poller.batch_size == 0 {
            return Err(ConfigError::Invalid("poller.batch_size must be at least 1".to_owned()));
        }
        if self.poller.block_ms == 0 {
            return Err(ConfigError::Invalid("poller.block_ms must be at least 1".to_owned()));
        }
        if self.poller.backoff_base_ms > self.poller.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "poller.backoff_base_ms must not exceed poller.backoff_max_ms".to_owned(),
            ));
        }
        if self.ingest.topic.is_empty() || self.control.topic.is_empty() {
            return Err(ConfigError::Invalid("topic names must not be empty".to_owned()));
        }
        Ok(())
    }

    /// Topics the poller watches: the configured list plus the ingest
    /// topic, without duplicates, in configuration order.
    pub fn watched_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::with_capacity(self.poller.topics.len().saturating_add(1));
        for topic in self.poller.topics.iter().chain(std::iter::once(&self.ingest.topic)) {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,
    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which log store implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `Dragonfly` / Redis streams.
    #[default]
    Dragonfly,
    /// Process-local log. Nothing survives a restart.
    Memory,
}

/// Log store connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Store implementation.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis URL for the `Dragonfly` backend.
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
        }
    }
}

/// Producer log ingestion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngestConfig {
    /// Topic admitted log lines are appended to.
    #[serde(default = "default_ingest_topic")]
    pub topic: String,
    /// Lines below this severity are filtered before storage.
    #[serde(default)]
    pub min_level: Severity,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topic: default_ingest_topic(),
            min_level: Severity::default(),
        }
    }
}

/// Where cursors start when the poller is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// Replay every topic from the beginning (`0`).
    #[default]
    Replay,
    /// Only relay records appended after startup (`$`).
    Tail,
}

impl StartMode {
    /// Initial cursor position for this mode.
    pub const fn initial_position(self) -> Position {
        match self {
            Self::Replay => Position::After(RecordId::ZERO),
            Self::Tail => Position::Latest,
        }
    }
}

/// Multi-topic poller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PollerConfig {
    /// Topics to watch.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    /// Initial cursor position.
    #[serde(default)]
    pub start: StartMode,
    /// Maximum records per topic per read.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// How long one read blocks waiting for data.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// First retry delay after a store error.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Ceiling for the retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl PollerConfig {
    /// Read bounds for each poll.
    pub const fn read_options(&self) -> ReadOptions {
        ReadOptions {
            batch_size: self.batch_size,
            block: Duration::from_millis(self.block_ms),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            topics: default_topics(),
            start: StartMode::default(),
            batch_size: default_batch_size(),
            block_ms: default_block_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Job state reconstruction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobsConfig {
    /// Stage prefixes whose lifecycle topics are projected into job views.
    #[serde(default = "default_job_prefixes")]
    pub prefixes: Vec<String>,
    /// How long a completed job stays visible.
    #[serde(default = "default_eviction_delay_ms")]
    pub eviction_delay_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_job_prefixes(),
            eviction_delay_ms: default_eviction_delay_ms(),
        }
    }
}

/// Control command configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlConfig {
    /// Topic control commands are appended to.
    #[serde(default = "default_control_topic")]
    pub topic: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            topic: default_control_topic(),
        }
    }
}

/// Output format for process logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Process logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_store_url() -> String {
    String::from("redis://redis:6379")
}

fn default_ingest_topic() -> String {
    String::from("logs")
}

fn default_topics() -> Vec<String> {
    [
        "drive_events",
        "rip.start",
        "rip.progress",
        "rip.complete",
        "enhance.start",
        "enhance.progress",
        "enhance.complete",
        "transcode.start",
        "transcode.progress",
        "transcode.complete",
        "metadata.start",
        "metadata.complete",
        "blackhole.complete",
        "logs",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

const fn default_batch_size() -> u64 {
    10
}

const fn default_block_ms() -> u64 {
    5000
}

const fn default_backoff_base_ms() -> u64 {
    100
}

const fn default_backoff_max_ms() -> u64 {
    10_000
}

fn default_job_prefixes() -> Vec<String> {
    ["rip", "enhance", "transcode", "metadata", "blackhole"]
        .into_iter()
        .map(String::from)
        .collect()
}

const fn default_eviction_delay_ms() -> u64 {
    5000
}

fn default_control_topic() -> String {
    String::from("control")
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = RelayConfig::parse("{}").unwrap_or_default();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ingest.topic, "logs");
        assert_eq!(config.ingest.min_level, Severity::Info);
        assert_eq!(config.poller.batch_size, 10);
        assert_eq!(config.poller.block_ms, 5000);
        assert_eq!(config.jobs.eviction_delay_ms, 5000);
        assert_eq!(config.control.topic, "control");
    }

    #[test]
    fn partial_yaml_overrides_fields() {
        let yaml = r"
server:
  port: 9000
store:
  backend: memory
ingest:
  min_level: warn
poller:
  topics: [rip.start, rip.complete]
  start: tail
logging:
  format: json
";
        let parsed = RelayConfig::parse(yaml);
        assert!(parsed.is_ok());
        let config = parsed.unwrap_or_default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.ingest.min_level, Severity::Warn);
        assert_eq!(config.poller.start, StartMode::Tail);
        assert_eq!(config.poller.batch_size, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn watched_topics_include_ingest_topic_once() {
        let mut config = RelayConfig::default();
        config.poller.topics = vec!["rip.start".to_owned(), "logs".to_owned()];
        assert_eq!(config.watched_topics(), vec!["rip.start", "logs"]);

        config.ingest.topic = "worker_logs".to_owned();
        assert_eq!(
            config.watched_topics(),
            vec!["rip.start", "logs", "worker_logs"]
        );
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = RelayConfig::default();
        config.apply_overrides(|name| match name {
            "REDIS_URL" => Some("redis://localhost:6380".to_owned()),
            "LOG_LEVEL" => Some("error".to_owned()),
            "REDIS_LOG_STREAM" => Some("app_logs".to_owned()),
            "PORT" => Some("8081".to_owned()),
            _ => None,
        });
        assert_eq!(config.store.url, "redis://localhost:6380");
        assert_eq!(config.ingest.min_level, Severity::Error);
        assert_eq!(config.ingest.topic, "app_logs");
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn unknown_log_level_override_falls_back_to_info() {
        let mut config = RelayConfig::default();
        config.ingest.min_level = Severity::Error;
        config.apply_overrides(|name| (name == "LOG_LEVEL").then(|| "loud".to_owned()));
        assert_eq!(config.ingest.min_level, Severity::Info);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RelayConfig::parse("poller:\n  batch_size: 0\n").is_err());
        assert!(
            RelayConfig::parse("poller:\n  backoff_base_ms: 500\n  backoff_max_ms: 100\n")
                .is_err()
        );
        assert!(RelayConfig::parse("control:\n  topic: ''\n").is_err());
    }

    #[test]
    fn load_reports_where_config_came_from() {
        let dir = std::env::temp_dir().join(format!("ripstream-config-{}", uuid::Uuid::now_v7()));
        let missing = dir.join("ripstream.yaml");
        let loaded = RelayConfig::load(&missing).map(|(_, source)| source);
        assert!(matches!(loaded, Ok(ConfigSource::Defaults)));

        assert!(std::fs::create_dir_all(&dir).is_ok());
        assert!(std::fs::write(&missing, "poller:\n  batch_size: 3\n").is_ok());
        let loaded = RelayConfig::load(&missing);
        assert!(matches!(
            loaded,
            Ok((ref config, ConfigSource::File)) if config.poller.batch_size == 3
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn start_modes_map_to_positions() {
        assert_eq!(
            StartMode::Replay.initial_position(),
            Position::After(RecordId::ZERO)
        );
        assert_eq!(StartMode::Tail.initial_position(), Position::Latest);
    }
}
