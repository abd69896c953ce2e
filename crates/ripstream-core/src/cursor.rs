//! Per-topic resume positions for the poller.
//!
//! One cursor per watched topic. A cursor only ever moves forward, and
//! the whole set lives exactly as long as the poller that owns it.

use ripstream_store::{Position, StreamCursor};
use ripstream_types::RecordId;

/// The cursors of every watched topic, in watch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSet {
    cursors: Vec<StreamCursor>,
}

impl CursorSet {
    /// Create one cursor per distinct topic, all at `start`.
    pub fn new<I, T>(topics: I, start: Position) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut cursors: Vec<StreamCursor> = Vec::new();
        for topic in topics {
            let topic = topic.into();
            if !cursors.iter().any(|c| c.topic == topic) {
                cursors.push(StreamCursor::new(topic, start));
            }
        }
        Self { cursors }
    }

    /// All cursors, ready to hand to a read.
    pub fn as_slice(&self) -> &[StreamCursor] {
        &self.cursors
    }

    /// Watched topic names.
    pub fn topics(&self) -> Vec<&str> {
        self.cursors.iter().map(|c| c.topic.as_str()).collect()
    }

    /// Current position of `topic`, if it is watched.
    pub fn position(&self, topic: &str) -> Option<Position> {
        self.cursors
            .iter()
            .find(|c| c.topic == topic)
            .map(|c| c.position)
    }

    /// Move `topic`'s cursor to `id`.
    ///
    /// Returns `false`, leaving the cursor alone, when the topic is not
    /// watched or `id` is not beyond the current position. A `Latest`
    /// cursor accepts any id.
    pub fn advance(&mut self, topic: &str, id: RecordId) -> bool {
        let Some(cursor) = self.cursors.iter_mut().find(|c| c.topic == topic) else {
            return false;
        };
        match cursor.position {
            Position::After(current) if id <= current => false,
            _ => {
                cursor.position = Position::After(id);
                true
            }
        }
    }

    /// Topics whose cursor is still `Latest`.
    pub fn unresolved(&self) -> Vec<String> {
        self.cursors
            .iter()
            .filter(|c| c.position == Position::Latest)
            .map(|c| c.topic.clone())
            .collect()
    }

    /// Pin a `Latest` cursor to the concrete `tail` id it stands for.
    ///
    /// Returns `false` when the topic is not watched or its cursor is
    /// already concrete.
    pub fn resolve(&mut self, topic: &str, tail: RecordId) -> bool {
        match self.cursors.iter_mut().find(|c| c.topic == topic) {
            Some(cursor) if cursor.position == Position::Latest => {
                cursor.position = Position::After(tail);
                true
            }
            _ => false,
        }
    }

    /// Number of watched topics.
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether no topics are watched.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
