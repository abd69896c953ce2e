//! Relay core for the ripstream event relay.
//!
//! Workers append events to topics in an ordered stream store. The relay
//! consumes every watched topic, fans each record out to live viewers,
//! reconstructs job state from lifecycle topics, and publishes operator
//! control commands back onto a control topic.
//!
//! # Architecture
//!
//! ```text
//! producers --> IngestGate --> LogStore <-- ControlPublisher <-- operators
//!                                 |
//!                              Poller (CursorSet, Backoff)
//!                                 |
//!                    +------------+------------+
//!                    |                         |
//!              BroadcastHub               JobTracker
//!                    |                    (JobProjection)
//!          SSE / WebSocket viewers
//! ```
//!
//! Delivery is at-least-once: a cursor advances before its record is
//! dispatched, and cursors live only as long as the poller.
//!
//! # Modules
//!
//! - [`config`] -- Typed configuration loaded from `ripstream.yaml`
//! - [`ingest`] -- Severity gate and stamping of producer log lines
//! - [`cursor`] -- Per-topic resume positions
//! - [`backoff`] -- Capped exponential retry delay
//! - [`poller`] -- The blocking multi-topic consumer loop
//! - [`hub`] -- Live subscriber registry and fan-out
//! - [`jobs`] -- Job state reconstruction with timed eviction
//! - [`control`] -- Pause/cancel/toggle publishing
//! - [`context`] -- The relay context wiring the above together

pub mod backoff;
pub mod config;
pub mod context;
pub mod control;
pub mod cursor;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod jobs;
pub mod poller;

pub use config::{ConfigSource, RelayConfig};
pub use context::RelayContext;
pub use error::RelayError;
pub use hub::{BroadcastHub, Frame, Subscription, TopicFilter};
pub use poller::{Poller, RecordListener};
