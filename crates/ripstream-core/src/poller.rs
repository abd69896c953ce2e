//! The blocking multi-topic consumer loop.
//!
//! [`Poller::run`] issues one bounded, blocking read across every watched
//! topic, advances each record's cursor, and hands the record to every
//! [`RecordListener`] in registration order. Records of one topic are
//! dispatched in id order; topics interleave however the store returns
//! them.
//!
//! Store faults are logged and retried forever with a capped exponential
//! delay. The cursor set is shared by all topics, so a fault stalls every
//! topic equally until the store recovers.

use std::sync::Arc;

use async_trait::async_trait;
use ripstream_store::{LogStore, ReadOptions, StoreError};
use ripstream_types::{LogRecord, RecordId};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::cursor::CursorSet;

/// Receives every record the poller dispatches.
///
/// Implementations must not fail the dispatch; problems are handled (and
/// logged) inside the listener.
#[async_trait]
pub trait RecordListener: Send + Sync {
    /// Called once per record, after its cursor has advanced.
    async fn on_record(&self, record: &LogRecord);
}

/// Cumulative counters for one poller run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Successful reads, including empty ones.
    pub reads: u64,
    /// Failed reads.
    pub failures: u64,
    /// Records handed to listeners.
    pub dispatched: u64,
}

/// Consumes all watched topics and dispatches their records.
pub struct Poller {
    store: Arc<dyn LogStore>,
    cursors: CursorSet,
    options: ReadOptions,
    backoff: Backoff,
    listeners: Vec<Arc<dyn RecordListener>>,
    stats: PollerStats,
}

impl Poller {
    /// Create a poller over `cursors` with no listeners.
    pub fn new(
        store: Arc<dyn LogStore>,
        cursors: CursorSet,
        options: ReadOptions,
        backoff: Backoff,
    ) -> Self {
        Self {
            store,
            cursors,
            options,
            backoff,
            listeners: Vec::new(),
            stats: PollerStats::default(),
        }
    }

    /// Append a listener. Listeners are called in the order added.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RecordListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Current cursor positions.
    pub const fn cursors(&self) -> &CursorSet {
        &self.cursors
    }

    /// Counters so far.
    pub const fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Perform exactly one read and dispatch what it returns.
    ///
    /// Returns the number of records dispatched.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails. Cursors are unchanged.
    pub async fn poll_once(&mut self) -> Result<usize, StoreError> {
        match self.fetch().await {
            Ok(records) => {
                self.stats.reads = self.stats.reads.saturating_add(1);
                Ok(self.dispatch(records).await)
            }
            Err(e) => {
                self.stats.failures = self.stats.failures.saturating_add(1);
                Err(e)
            }
        }
    }

    /// Run until `shutdown` is cancelled, then return the final counters.
    pub async fn run(mut self, shutdown: CancellationToken) -> PollerStats {
        info!(
            topics = ?self.cursors.topics(),
            batch_size = self.options.batch_size,
            block_ms = u64::try_from(self.options.block.as_millis()).unwrap_or(u64::MAX),
            "Poller starting"
        );

        loop {
            let result = tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.fetch() => result,
            };

            match result {
                Ok(records) => {
                    self.stats.reads = self.stats.reads.saturating_add(1);
                    if self.backoff.attempt() > 0 {
                        info!(failures = self.backoff.attempt(), "Log store reachable again");
                        self.backoff.reset();
                    }
                    self.dispatch(records).await;
                }
                Err(e) => {
                    self.stats.failures = self.stats.failures.saturating_add(1);
                    let delay = self.backoff.next_delay();
                    warn!(
                        error = %e,
                        attempt = self.backoff.attempt(),
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Log store read failed, retrying"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(
            reads = self.stats.reads,
            failures = self.stats.failures,
            dispatched = self.stats.dispatched,
            "Poller stopped"
        );
        self.stats
    }

    /// Spawn [`Poller::run`] on a background Tokio task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<PollerStats> {
        tokio::spawn(self.run(shutdown))
    }

    /// Pin any `Latest` cursor to its topic's current tail, then read.
    ///
    /// Pinning happens once per cursor, so a quiet topic does not skip
    /// records appended between two reads.
    async fn fetch(&mut self) -> Result<Vec<LogRecord>, StoreError> {
        for topic in self.cursors.unresolved() {
            let tail = self.store.tail_id(&topic).await?.unwrap_or(RecordId::ZERO);
            self.cursors.resolve(&topic, tail);
            debug!(topic = %topic, %tail, "Pinned tail cursor");
        }
        self.store
            .read_since(self.cursors.as_slice(), self.options)
            .await
    }

    async fn dispatch(&mut self, records: Vec<LogRecord>) -> usize {
        let mut dispatched = 0usize;
        for record in records {
            // Cursor moves first: each record is dispatched at most once per run.
            if !self.cursors.advance(&record.topic, record.id) {
                debug!(topic = %record.topic, id = %record.id, "Skipping record at or behind cursor");
                continue;
            }
            for listener in &self.listeners {
                listener.on_record(&record).await;
            }
            dispatched = dispatched.saturating_add(1);
        }
        self.stats.dispatched = self
            .stats
            .dispatched
            .saturating_add(u64::try_from(dispatched).unwrap_or(u64::MAX));
        dispatched
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("cursors", &self.cursors)
            .field("options", &self.options)
            .field("listeners", &self.listeners.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ripstream_store::{MemoryLog, Position};
    use ripstream_types::{FieldMap, RecordId};
    use tokio::sync::Mutex;

    use super::*;

    /// Collects everything it is handed.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<LogRecord>>,
    }

    #[async_trait]
    impl RecordListener for Recorder {
        async fn on_record(&self, record: &LogRecord) {
            self.seen.lock().await.push(record.clone());
        }
    }

    fn fields(n: u32) -> FieldMap {
        FieldMap::from([("n".to_owned(), n.to_string())])
    }

    fn options() -> ReadOptions {
        ReadOptions {
            batch_size: 2,
            block: Duration::from_millis(50),
        }
    }

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(10), Duration::from_millis(40))
    }

    #[tokio::test]
    async fn poll_once_advances_cursors_in_batches() {
        let store = Arc::new(MemoryLog::new());
        for n in 0..5 {
            let _ = store.append("logs", &fields(n)).await;
        }
        let recorder = Arc::new(Recorder::default());
        let mut poller = Poller::new(
            store,
            CursorSet::new(["logs"], Position::After(RecordId::ZERO)),
            options(),
            backoff(),
        )
        .with_listener(Arc::clone(&recorder) as Arc<dyn RecordListener>);

        assert_eq!(poller.poll_once().await.unwrap_or(0), 2);
        assert_eq!(poller.poll_once().await.unwrap_or(0), 2);
        assert_eq!(poller.poll_once().await.unwrap_or(0), 1);
        assert_eq!(poller.poll_once().await.unwrap_or(99), 0);

        let seen = recorder.seen.lock().await;
        let order: Vec<_> = seen.iter().filter_map(|r| r.field("n")).collect();
        assert_eq!(order, vec!["0", "1", "2", "3", "4"]);
        let last = seen.last().map(|r| r.id);
        assert_eq!(poller.cursors().position("logs").and_then(|p| p.last_id()), last);
    }

    #[tokio::test]
    async fn each_topic_is_delivered_in_id_order() {
        let store = Arc::new(MemoryLog::new());
        for n in 0..4 {
            let _ = store.append("rip.progress", &fields(n)).await;
            let _ = store.append("logs", &fields(n)).await;
        }
        let recorder = Arc::new(Recorder::default());
        let mut poller = Poller::new(
            store,
            CursorSet::new(["rip.progress", "logs"], Position::After(RecordId::ZERO)),
            options(),
            backoff(),
        )
        .with_listener(Arc::clone(&recorder) as Arc<dyn RecordListener>);

        while poller.poll_once().await.unwrap_or(0) > 0 {}

        let seen = recorder.seen.lock().await;
        assert_eq!(seen.len(), 8);
        for topic in ["rip.progress", "logs"] {
            let ids: Vec<_> = seen.iter().filter(|r| r.topic == topic).map(|r| r.id).collect();
            assert!(ids.windows(2).all(|w| matches!(w, [a, b] if a < b)));
        }
    }

    #[tokio::test]
    async fn tail_mode_keeps_records_appended_between_reads() {
        let store = Arc::new(MemoryLog::new());
        let _ = store.append("b", &fields(0)).await;
        let recorder = Arc::new(Recorder::default());
        let mut poller = Poller::new(
            Arc::clone(&store) as Arc<dyn LogStore>,
            CursorSet::new(["a", "b"], Position::Latest),
            options(),
            backoff(),
        )
        .with_listener(Arc::clone(&recorder) as Arc<dyn RecordListener>);

        // First read: both cursors get pinned, then `a` delivers.
        let writer = Arc::clone(&store);
        let append_a = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.append("a", &fields(1)).await
        });
        assert_eq!(poller.poll_once().await.unwrap_or(0), 1);
        assert!(append_a.await.is_ok_and(|r| r.is_ok()));
        assert!(poller.cursors().unresolved().is_empty());

        // `b` stayed quiet during the first read; this record must not be lost.
        let _ = store.append("b", &fields(2)).await;
        assert_eq!(poller.poll_once().await.unwrap_or(0), 1);

        let seen = recorder.seen.lock().await;
        let delivered: Vec<_> = seen
            .iter()
            .map(|r| (r.topic.as_str(), r.field("n").unwrap_or_default()))
            .collect();
        assert_eq!(delivered, vec![("a", "1"), ("b", "2")]);
    }

    #[tokio::test]
    async fn failed_read_leaves_cursors_untouched() {
        let store = Arc::new(MemoryLog::new());
        let _ = store.append("logs", &fields(1)).await;
        store.set_available(false);
        let mut poller = Poller::new(
            Arc::clone(&store) as Arc<dyn LogStore>,
            CursorSet::new(["logs"], Position::After(RecordId::ZERO)),
            options(),
            backoff(),
        );
        assert!(poller.poll_once().await.is_err());
        assert_eq!(
            poller.cursors().position("logs"),
            Some(Position::After(RecordId::ZERO))
        );
        assert_eq!(poller.stats().failures, 1);
    }

    #[tokio::test]
    async fn run_survives_outage_and_stops_on_shutdown() {
        let store = Arc::new(MemoryLog::new());
        store.set_available(false);
        let recorder = Arc::new(Recorder::default());
        let shutdown = CancellationToken::new();
        let handle = Poller::new(
            Arc::clone(&store) as Arc<dyn LogStore>,
            CursorSet::new(["logs"], Position::After(RecordId::ZERO)),
            options(),
            backoff(),
        )
        .with_listener(Arc::clone(&recorder) as Arc<dyn RecordListener>)
        .spawn(shutdown.clone());

        // Several retries happen while the store is down.
        tokio::time::sleep(Duration::from_millis(150)).await;
        store.set_available(true);
        let _ = store.append("logs", &fields(7)).await;

        let mut delivered = false;
        for _ in 0..100 {
            if !recorder.seen.lock().await.is_empty() {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(delivered, "record should be relayed once the store is back");

        shutdown.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(2), handle).await;
        let stats = stats.ok().and_then(Result::ok).unwrap_or_default();
        assert!(stats.failures >= 2);
        assert_eq!(stats.dispatched, 1);
    }
}
