//! The [`LogStore`] seam and the cursor types it reads with.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use ripstream_types::{FieldMap, LogRecord, RecordId};

use crate::error::StoreError;

/// Where a read resumes within one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Only records appended after the read is issued (`$`).
    Latest,
    /// Records strictly after this id. [`RecordId::ZERO`] replays everything.
    After(RecordId),
}

impl Position {
    /// The id form the stream store expects in `XREAD`.
    pub fn wire(&self) -> String {
        match self {
            Self::Latest => "$".to_owned(),
            Self::After(id) => id.to_string(),
        }
    }

    /// The last consumed id, if one is known.
    pub const fn last_id(&self) -> Option<RecordId> {
        match self {
            Self::Latest => None,
            Self::After(id) => Some(*id),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

/// Last consumed position of one watched topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamCursor {
    /// Topic name.
    pub topic: String,
    /// Resume position.
    pub position: Position,
}

impl StreamCursor {
    /// Create a cursor.
    pub fn new(topic: impl Into<String>, position: Position) -> Self {
        Self {
            topic: topic.into(),
            position,
        }
    }
}

/// Bounds for one blocking multi-topic read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Maximum records returned per topic.
    pub batch_size: u64,
    /// How long to wait for new data before returning empty.
    pub block: Duration,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            block: Duration::from_millis(5000),
        }
    }
}

/// An ordered, appendable, replayable log keyed by topic.
///
/// Ids are assigned by the store and strictly increase within a topic.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one record to `topic` and return its assigned id.
    async fn append(&self, topic: &str, fields: &FieldMap) -> Result<RecordId, StoreError>;

    /// Read records after each cursor, blocking up to `options.block` when
    /// none are available.
    ///
    /// Returns as soon as any watched topic has data. Records of one topic
    /// are returned in id order. An empty vector means the block elapsed.
    async fn read_since(
        &self,
        cursors: &[StreamCursor],
        options: ReadOptions,
    ) -> Result<Vec<LogRecord>, StoreError>;

    /// Id of the newest record in `topic`, or `None` if it holds none.
    async fn tail_id(&self, topic: &str) -> Result<Option<RecordId>, StoreError>;

    /// Read every record of `topic`, oldest first.
    async fn read_range(&self, topic: &str) -> Result<Vec<LogRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_of_positions() {
        assert_eq!(Position::Latest.wire(), "$");
        assert_eq!(Position::After(RecordId::ZERO).wire(), "0-0");
        assert_eq!(Position::After(RecordId::new(12, 3)).to_string(), "12-3");
    }

    #[test]
    fn last_id_is_none_for_latest() {
        assert_eq!(Position::Latest.last_id(), None);
        assert_eq!(
            Position::After(RecordId::new(1, 1)).last_id(),
            Some(RecordId::new(1, 1))
        );
    }
}
