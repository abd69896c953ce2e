//! Stream log store for the ripstream relay.
//!
//! The relay treats the store as an ordered, appendable, replayable log
//! keyed by topic. This crate defines that seam ([`LogStore`]) and two
//! implementations of it.
//!
//! # Modules
//!
//! - [`store`] -- The [`LogStore`] trait, cursors, and read options
//! - [`dragonfly`] -- `Dragonfly` (Redis-compatible) streams via `XADD`/`XREAD`/`XRANGE`
//! - [`memory`] -- In-process log with the same blocking-read semantics
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyLog;
pub use error::StoreError;
pub use memory::MemoryLog;
pub use store::{LogStore, Position, ReadOptions, StreamCursor};
