//! Server-sent event streams of relayed records.
//!
//! Each record is one `data:` event holding its JSON frame. A keep-alive
//! comment is sent every 15 seconds. The hub subscription lives inside the
//! stream, so it is unregistered when the client goes away.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use ripstream_core::{Subscription, TopicFilter};
use tracing::debug;

use crate::state::AppState;

/// Interval between SSE keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Stream records from every watched topic.
///
/// # Route
///
/// `GET /api/events`
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    open(&state, TopicFilter::All)
}

/// Stream only producer log lines from the ingest topic.
///
/// # Route
///
/// `GET /api/logs/stream`
pub async fn log_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = TopicFilter::only(state.relay.ingest_topic());
    open(&state, filter)
}

fn open(
    state: &AppState,
    filter: TopicFilter,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let subscription = state.relay.hub.subscribe(filter);
    debug!(subscriber = %subscription.id(), "SSE client connected");

    let events = frames(subscription).take_until(state.shutdown.clone().cancelled_owned());
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

fn frames(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        let frame = subscription.recv().await?;
        Some((Ok(Event::default().data(frame.json.as_str())), subscription))
    })
}
