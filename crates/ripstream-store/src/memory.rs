//! In-process stream log.
//!
//! Behaves like the `Dragonfly` log for everything the relay relies on:
//! `<ms>-<seq>` ids that strictly increase per topic, per-topic batch
//! limits, and reads that block until data arrives or the block elapses.
//! [`MemoryLog::set_available`] simulates an outage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ripstream_types::{FieldMap, LogRecord, RecordId};
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use crate::error::StoreError;
use crate::store::{LogStore, Position, ReadOptions, StreamCursor};

/// An in-memory, process-local log store.
#[derive(Debug)]
pub struct MemoryLog {
    topics: RwLock<BTreeMap<String, Vec<LogRecord>>>,
    appended: Notify,
    available: AtomicBool,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(BTreeMap::new()),
            appended: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Mark the store reachable or unreachable. While unreachable every
    /// operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
        // Wake blocked readers so they observe the change.
        self.appended.notify_waiters();
    }

    /// Number of records currently stored in `topic`.
    pub async fn len(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, Vec::len)
    }

    /// Whether `topic` holds no records.
    pub async fn is_empty(&self, topic: &str) -> bool {
        self.len(topic).await == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory log offline".to_owned()))
        }
    }

    /// Replace `Latest` positions with the current tail of each topic so
    /// records appended while the read is blocked are still returned.
    async fn resolve(&self, cursors: &[StreamCursor]) -> Vec<(String, RecordId)> {
        let topics = self.topics.read().await;
        cursors
            .iter()
            .map(|cursor| {
                let after = match cursor.position {
                    Position::After(id) => id,
                    Position::Latest => topics
                        .get(&cursor.topic)
                        .and_then(|records| records.last())
                        .map_or(RecordId::ZERO, |r| r.id),
                };
                (cursor.topic.clone(), after)
            })
            .collect()
    }

    async fn collect(&self, resolved: &[(String, RecordId)], batch_size: u64) -> Vec<LogRecord> {
        let limit = usize::try_from(batch_size).unwrap_or(usize::MAX);
        let topics = self.topics.read().await;
        let mut out = Vec::new();
        for (topic, after) in resolved {
            if let Some(records) = topics.get(topic) {
                out.extend(
                    records
                        .iter()
                        .filter(|r| r.id > *after)
                        .take(limit)
                        .cloned(),
                );
            }
        }
        out
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[async_trait]
impl LogStore for MemoryLog {
    async fn append(&self, topic: &str, fields: &FieldMap) -> Result<RecordId, StoreError> {
        self.check_available()?;
        let id = {
            let mut topics = self.topics.write().await;
            let records = topics.entry(topic.to_owned()).or_default();
            let candidate = RecordId::new(now_ms(), 0);
            let id = match records.last() {
                Some(last) if candidate <= last.id => last.id.successor(),
                _ => candidate,
            };
            records.push(LogRecord::new(topic, id, fields.clone()));
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn read_since(
        &self,
        cursors: &[StreamCursor],
        options: ReadOptions,
    ) -> Result<Vec<LogRecord>, StoreError> {
        self.check_available()?;
        let deadline = Instant::now()
            .checked_add(options.block)
            .unwrap_or_else(Instant::now);
        let resolved = self.resolve(cursors).await;

        loop {
            // Register interest before looking so an append between the
            // check and the wait is not missed.
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.check_available()?;
            let batch = self.collect(&resolved, options.batch_size).await;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn tail_id(&self, topic: &str) -> Result<Option<RecordId>, StoreError> {
        self.check_available()?;
        Ok(self
            .topics
            .read()
            .await
            .get(topic)
            .and_then(|records| records.last())
            .map(|r| r.id))
    }

    async fn read_range(&self, topic: &str) -> Result<Vec<LogRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .topics
            .read()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn opts(batch_size: u64, block_ms: u64) -> ReadOptions {
        ReadOptions {
            batch_size,
            block: Duration::from_millis(block_ms),
        }
    }

    #[tokio::test]
    async fn ids_strictly_increase_within_topic() {
        let log = MemoryLog::new();
        let mut last = RecordId::ZERO;
        for _ in 0..50 {
            let id = log.append("logs", &fields(&[("m", "x")])).await;
            let id = id.unwrap_or(RecordId::ZERO);
            assert!(id > last);
            last = id;
        }
    }

    #[tokio::test]
    async fn read_since_respects_cursor_and_batch() {
        let log = MemoryLog::new();
        let mut ids = Vec::new();
        for n in 0..5 {
            let n = n.to_string();
            ids.push(
                log.append("logs", &fields(&[("n", n.as_str())]))
                    .await
                    .unwrap_or(RecordId::ZERO),
            );
        }
        let second = ids.get(1).copied().unwrap_or(RecordId::ZERO);
        let cursors = [StreamCursor::new("logs", Position::After(second))];
        let batch = log.read_since(&cursors, opts(2, 10)).await.unwrap_or_default();
        let got: Vec<_> = batch.iter().filter_map(|r| r.field("n")).collect();
        assert_eq!(got, vec!["2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_read_returns_after_block() {
        let log = MemoryLog::new();
        let cursors = [StreamCursor::new("logs", Position::After(RecordId::ZERO))];
        let started = Instant::now();
        let batch = log.read_since(&cursors, opts(10, 5000)).await;
        assert!(batch.is_ok_and(|b| b.is_empty()));
        assert!(started.elapsed() >= Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn blocked_read_wakes_on_append() {
        let log = Arc::new(MemoryLog::new());
        let reader = Arc::clone(&log);
        let handle = tokio::spawn(async move {
            let cursors = [StreamCursor::new("rip.start", Position::Latest)];
            reader.read_since(&cursors, opts(10, 10_000)).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let appended = log.append("rip.start", &fields(&[("job_id", "J1")])).await;
        assert!(appended.is_ok());

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        let batch = result
            .ok()
            .and_then(Result::ok)
            .and_then(Result::ok)
            .unwrap_or_default();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.first().and_then(|r| r.field("job_id")), Some("J1"));
    }

    #[tokio::test]
    async fn latest_skips_existing_records() {
        let log = MemoryLog::new();
        let _ = log.append("logs", &fields(&[("old", "1")])).await;
        let cursors = [StreamCursor::new("logs", Position::Latest)];
        let batch = log.read_since(&cursors, opts(10, 10)).await.unwrap_or_default();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let log = MemoryLog::new();
        log.set_available(false);
        assert!(matches!(
            log.append("logs", &fields(&[("m", "x")])).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(log.read_range("logs").await.is_err());
        let cursors = [StreamCursor::new("logs", Position::Latest)];
        assert!(log.read_since(&cursors, opts(1, 10)).await.is_err());

        log.set_available(true);
        assert!(log.append("logs", &fields(&[("m", "x")])).await.is_ok());
        assert_eq!(log.len("logs").await, 1);
    }

    #[tokio::test]
    async fn tail_id_tracks_newest_record() {
        let log = MemoryLog::new();
        assert!(log.tail_id("logs").await.is_ok_and(|t| t.is_none()));
        let _ = log.append("logs", &fields(&[("n", "1")])).await;
        let second = log.append("logs", &fields(&[("n", "2")])).await.ok();
        assert_eq!(log.tail_id("logs").await.ok().flatten(), second);

        log.set_available(false);
        assert!(log.tail_id("logs").await.is_err());
    }

    #[tokio::test]
    async fn read_range_returns_everything_in_order() {
        let log = MemoryLog::new();
        for n in ["a", "b", "c"] {
            let _ = log.append("control", &fields(&[("n", n)])).await;
        }
        let all = log.read_range("control").await.unwrap_or_default();
        let got: Vec<_> = all.iter().filter_map(|r| r.field("n")).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
        assert!(log.read_range("missing").await.is_ok_and(|r| r.is_empty()));
    }
}
