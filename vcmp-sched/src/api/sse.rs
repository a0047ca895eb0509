//! Server-Sent Events (SSE) broadcaster
//!
//! Streams room events to connected clients. `?room_id=N` narrows the
//! stream to one room.

use crate::api::server::AppContext;
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use vcmp_common::events::RoomEvent;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub room_id: Option<u64>,
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected (room filter: {:?})", query.room_id);

    let rx = ctx.state.subscribe_events();
    let room_filter = query.room_id;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if room_filter.map_or(true, |id| id == event.room_id()) => to_sse(&event),
            Ok(_) => None,
            Err(e) => {
                // Lagged receiver; the client missed some events
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse(event: &RoomEvent) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
