//! HTTP gateway for the ripstream event relay.
//!
//! Exposes producer log ingestion, topic replay, live push over SSE and
//! `WebSocket`, reconstructed job views, and operator control commands.
//! All handlers share one [`state::AppState`] wrapping the relay context.
//!
//! # Modules
//!
//! - [`router`] -- Route table and middleware
//! - [`server`] -- TCP bind and graceful shutdown
//! - [`handlers`] -- Ingestion, replay, jobs, health
//! - [`control`] -- Pause/cancel/toggle endpoints
//! - [`sse`] -- Server-sent event streams
//! - [`ws`] -- `WebSocket` event stream
//! - [`error`] -- HTTP error mapping

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;
pub mod ws;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{start_server, ServerError};
pub use state::AppState;
