//! Shared type definitions for the ripstream event relay.
//!
//! This crate is the single source of truth for every record that flows
//! through the relay: log records read from the stream store, the job
//! views reconstructed from lifecycle topics, severities used by the
//! ingest gate, and the control commands published for workers.
//!
//! Types exposed to the dashboard derive [`ts_rs::TS`] so TypeScript
//! bindings can be generated with `cargo test`.
//!
//! # Modules
//!
//! - [`record`] -- Stream ids, field maps, and the [`LogRecord`] envelope
//! - [`severity`] -- Log severity ordering
//! - [`job`] -- Lifecycle suffixes and the [`JobView`] projection
//! - [`control`] -- Pause/cancel/toggle commands

pub mod control;
pub mod job;
pub mod record;
pub mod severity;

pub use control::{ControlAction, ControlCommand, ControlTarget};
pub use job::{JobStatus, JobView, Lifecycle};
pub use record::{FieldMap, LogRecord, ParseRecordIdError, RecordId};
pub use severity::{Severity, UnknownSeverity};
