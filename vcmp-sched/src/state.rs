//! Shared service state
//!
//! Room state is owned by the room controllers; what is shared across the
//! service is only the event fan-out and a few counters for health output.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;
use vcmp_common::events::RoomEvent;

/// Buffered events per subscriber before it starts lagging
const EVENT_BUFFER: usize = 256;

/// Shared state accessible by all components
pub struct SharedState {
    /// Event broadcaster for SSE and announcements
    event_tx: broadcast::Sender<RoomEvent>,

    /// Events emitted since startup
    events_total: AtomicU64,

    started_at: Instant,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            event_tx,
            events_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: RoomEvent) {
        self.events_total.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoomEvent> {
        self.event_tx.subscribe()
    }

    pub fn events_total(&self) -> u64 {
        self.events_total.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
