//! Live subscriber registry and per-record fan-out.
//!
//! Every record the poller dispatches is serialized once into a [`Frame`]
//! and pushed to each registered subscriber whose [`TopicFilter`] matches.
//! Sinks are unbounded channels, so a slow subscriber only grows its own
//! queue and never holds up the others. A closed sink is treated as a
//! write failure and its subscriber is removed.
//!
//! Broadcast works on a snapshot of the registry taken before any sink is
//! written, so registration and removal can race with a broadcast freely.
//! Nothing is retained for late joiners.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ripstream_types::LogRecord;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::poller::RecordListener;

/// Identifier of one live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which topics a subscriber wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// Every watched topic.
    All,
    /// Only these topics.
    Topics(HashSet<String>),
}

impl TopicFilter {
    /// Filter accepting a single topic.
    pub fn only(topic: impl Into<String>) -> Self {
        Self::Topics(HashSet::from([topic.into()]))
    }

    /// Whether records of `topic` should be delivered.
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            Self::All => true,
            Self::Topics(topics) => topics.contains(topic),
        }
    }
}

/// One record as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The record.
    pub record: LogRecord,
    /// The record serialized as a single JSON object.
    pub json: String,
}

/// Sending half of a subscriber's queue.
pub type FrameSink = mpsc::UnboundedSender<Arc<Frame>>;

/// A registered push connection.
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Topics to deliver.
    pub filter: TopicFilter,
    /// Where frames are written.
    pub sink: FrameSink,
}

/// Registry of live subscribers.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: DashMap<SubscriberId, Subscriber>,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber and return its id.
    pub fn register(&self, subscriber: Subscriber) -> SubscriberId {
        let id = SubscriberId::new();
        self.subscribers.insert(id, subscriber);
        debug!(subscriber = %id, total = self.subscribers.len(), "subscriber registered");
        id
    }

    /// Remove a subscriber. Removing an unknown id is a no-op.
    ///
    /// Returns whether a subscriber was removed.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, total = self.subscribers.len(), "subscriber unregistered");
        }
        removed
    }

    /// Register a new channel-backed subscriber and return the handle that
    /// receives its frames. Dropping the handle unregisters it.
    pub fn subscribe(self: &Arc<Self>, filter: TopicFilter) -> Subscription {
        let (sink, receiver) = mpsc::unbounded_channel();
        let id = self.register(Subscriber { filter, sink });
        Subscription {
            id,
            receiver,
            hub: Arc::clone(self),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Push `record` to every matching subscriber.
    ///
    /// Returns the number of subscribers the frame was delivered to.
    /// Subscribers whose sink is closed are removed; nothing is reported
    /// to the caller or to other subscribers.
    pub fn broadcast(&self, record: &LogRecord) -> usize {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!(topic = %record.topic, id = %record.id, "Failed to serialize record: {e}");
                return 0;
            }
        };
        let frame = Arc::new(Frame {
            record: record.clone(),
            json,
        });

        // Snapshot first; no registry lock is held while writing.
        let targets: Vec<(SubscriberId, FrameSink)> = self
            .subscribers
            .iter()
            .filter(|entry| entry.value().filter.matches(&record.topic))
            .map(|entry| (*entry.key(), entry.value().sink.clone()))
            .collect();

        let mut delivered = 0usize;
        for (id, sink) in targets {
            if sink.send(Arc::clone(&frame)).is_ok() {
                delivered = delivered.saturating_add(1);
            } else {
                debug!(subscriber = %id, "subscriber sink closed, removing");
                self.unregister(id);
            }
        }
        delivered
    }
}

#[async_trait]
impl RecordListener for BroadcastHub {
    async fn on_record(&self, record: &LogRecord) {
        self.broadcast(record);
    }
}

/// Receiving side of a hub subscription.
///
/// Unregisters from the hub when dropped, so a transport only needs to
/// drop this when its connection ends.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<Arc<Frame>>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    /// This subscriber's id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` only if the subscriber was removed from the hub.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}
