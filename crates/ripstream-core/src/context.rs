//! The relay context: one store, one hub, one job tracker, shared by the
//! poller and every request handler.

use std::sync::Arc;
use std::time::Duration;

use ripstream_store::{LogStore, StoreError};
use ripstream_types::LogRecord;

use crate::backoff::Backoff;
use crate::config::{PollerConfig, RelayConfig};
use crate::control::ControlPublisher;
use crate::cursor::CursorSet;
use crate::hub::BroadcastHub;
use crate::ingest::{IngestGate, Ingestor};
use crate::jobs::{JobProjection, JobTracker};
use crate::poller::Poller;

/// Shared relay state.
///
/// Cheap to clone; every component is reference counted.
#[derive(Clone)]
pub struct RelayContext {
    /// Backing log store.
    pub store: Arc<dyn LogStore>,
    /// Live subscriber registry.
    pub hub: Arc<BroadcastHub>,
    /// Reconstructed job views.
    pub jobs: Arc<JobTracker>,
    /// Producer log gate.
    pub ingestor: Ingestor,
    /// Control command publisher.
    pub control: ControlPublisher,
    watched: Vec<String>,
    poller: PollerConfig,
}

impl RelayContext {
    /// Wire the relay components for `config` over `store`.
    pub fn new(config: &RelayConfig, store: Arc<dyn LogStore>) -> Self {
        let projection = JobProjection::new(config.jobs.prefixes.iter().cloned());
        let grace = Duration::from_millis(config.jobs.eviction_delay_ms);
        Self {
            hub: Arc::new(BroadcastHub::new()),
            jobs: Arc::new(JobTracker::new(projection, grace)),
            ingestor: Ingestor::new(
                Arc::clone(&store),
                IngestGate::new(config.ingest.min_level),
                config.ingest.topic.clone(),
            ),
            control: ControlPublisher::new(Arc::clone(&store), config.control.topic.clone()),
            watched: config.watched_topics(),
            poller: config.poller.clone(),
            store,
        }
    }

    /// Topics the poller consumes.
    pub fn watched_topics(&self) -> &[String] {
        &self.watched
    }

    /// Topic producer log lines are appended to.
    pub fn ingest_topic(&self) -> &str {
        self.ingestor.topic()
    }

    /// Build the poller over every watched topic. Records go to the hub
    /// first, then to the job tracker.
    pub fn poller(&self) -> Poller {
        let cursors = CursorSet::new(
            self.watched.iter().cloned(),
            self.poller.start.initial_position(),
        );
        let backoff = Backoff::new(
            Duration::from_millis(self.poller.backoff_base_ms),
            Duration::from_millis(self.poller.backoff_max_ms),
        );
        Poller::new(
            Arc::clone(&self.store),
            cursors,
            self.poller.read_options(),
            backoff,
        )
        .with_listener(Arc::clone(&self.hub) as _)
        .with_listener(Arc::clone(&self.jobs) as _)
    }

    /// Every record currently retained on `topic`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn replay(&self, topic: &str) -> Result<Vec<LogRecord>, StoreError> {
        self.store.read_range(topic).await
    }
}

impl std::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayContext")
            .field("watched", &self.watched)
            .field("subscribers", &self.hub.subscriber_count())
            .finish_non_exhaustive()
    }
}
