//! `Dragonfly` (Redis-compatible) stream log.
//!
//! Each topic is one stream key. The relay maps its operations onto
//! stream commands:
//!
//! | Operation | Command |
//! |-----------|---------|
//! | `append` | `XADD <topic> * field value ...` |
//! | `read_since` | `XREAD COUNT n BLOCK ms STREAMS t1 .. tn id1 .. idn` |
//! | `read_range` | `XRANGE <topic> - +` |
//!
//! A blocking `XREAD` parks the connection it runs on, so reads use a
//! dedicated client and never delay appends.

use async_trait::async_trait;
use fred::interfaces::StreamsInterface;
use fred::prelude::*;
use fred::types::streams::{XReadResponse, XReadValue};
use ripstream_types::{FieldMap, LogRecord, RecordId};

use crate::error::StoreError;
use crate::store::{LogStore, ReadOptions, StreamCursor};

/// Connection handles to a `Dragonfly` instance used as the log store.
#[derive(Clone)]
pub struct DragonflyLog {
    /// Appends and range scans.
    client: Client,
    /// Blocking reads only.
    reader: Client,
}

impl DragonflyLog {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if either connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = build_client(config.clone())?;
        client.init().await?;

        let reader = build_client(config)?;
        reader.init().await?;

        tracing::info!("Connected to Dragonfly log store");
        Ok(Self { client, reader })
    }

    /// Return a reference to the command [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

/// First reconnect delay after a dropped connection, in milliseconds.
const RECONNECT_MIN_DELAY_MS: u32 = 100;

/// Ceiling for the reconnect delay, in milliseconds.
const RECONNECT_MAX_DELAY_MS: u32 = 10_000;

/// Build a client that reconnects forever after the connection drops.
/// Without a policy a dropped connection is never re-established.
fn build_client(config: Config) -> Result<Client, StoreError> {
    let policy =
        ReconnectPolicy::new_exponential(0, RECONNECT_MIN_DELAY_MS, RECONNECT_MAX_DELAY_MS, 2);
    Ok(Builder::from_config(config).set_policy(policy).build()?)
}

/// Convert one stream entry into a [`LogRecord`].
fn to_record(
    topic: &str,
    (id, fields): XReadValue<String, String, String>,
) -> Result<LogRecord, StoreError> {
    let id: RecordId = id.parse()?;
    Ok(LogRecord::new(topic, id, fields.into_iter().collect()))
}

#[async_trait]
impl LogStore for DragonflyLog {
    async fn append(&self, topic: &str, fields: &FieldMap) -> Result<RecordId, StoreError> {
        let pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let id: String = self.client.xadd(topic, false, None, "*", pairs).await?;
        Ok(id.parse()?)
    }

    async fn read_since(
        &self,
        cursors: &[StreamCursor],
        options: ReadOptions,
    ) -> Result<Vec<LogRecord>, StoreError> {
        if cursors.is_empty() {
            tokio::time::sleep(options.block).await;
            return Ok(Vec::new());
        }

        let keys: Vec<String> = cursors.iter().map(|c| c.topic.clone()).collect();
        let ids: Vec<String> = cursors.iter().map(|c| c.position.wire()).collect();
        // BLOCK 0 waits forever; keep the read bounded.
        let block_ms = u64::try_from(options.block.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);

        let mut response: XReadResponse<String, String, String, String> = self
            .reader
            .xread_map(Some(options.batch_size), Some(block_ms), keys, ids)
            .await?;

        // Emit topics in cursor order; entries within a topic keep store order.
        let mut records = Vec::new();
        for cursor in cursors {
            let Some(entries) = response.remove(&cursor.topic) else {
                continue;
            };
            for entry in entries {
                records.push(to_record(&cursor.topic, entry)?);
            }
        }
        Ok(records)
    }

    async fn tail_id(&self, topic: &str) -> Result<Option<RecordId>, StoreError> {
        let newest: Vec<XReadValue<String, String, String>> =
            self.client.xrevrange_values(topic, "+", "-", Some(1)).await?;
        match newest.into_iter().next() {
            Some((id, _)) => Ok(Some(id.parse()?)),
            None => Ok(None),
        }
    }

    async fn read_range(&self, topic: &str) -> Result<Vec<LogRecord>, StoreError> {
        let entries: Vec<XReadValue<String, String, String>> =
            self.client.xrange_values(topic, "-", "+", None).await?;
        entries
            .into_iter()
            .map(|entry| to_record(topic, entry))
            .collect()
    }
}

impl std::fmt::Debug for DragonflyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyLog")
            .field("connected", &self.client.is_connected())
            .finish_non_exhaustive()
    }
}
