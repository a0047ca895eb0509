//! Test Helper Utilities
//!
//! Shared fakes and a harness for driving the scheduler in tests

#![allow(dead_code)]

pub mod fake_resolver;
pub mod fake_transport;

pub use fake_resolver::FakeResolver;
pub use fake_transport::{FakeTransport, TransportCall};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use vcmp_common::events::RoomEvent;
use vcmp_sched::room::{EnqueueOutcome, JoinOutcome, Requester, RoomId, RoomSnapshot};
use vcmp_sched::transport::ChannelRef;
use vcmp_sched::{Scheduler, SharedState};

pub const ROOM: RoomId = RoomId(1);

pub fn general() -> ChannelRef {
    ChannelRef::new(10, "General")
}

pub fn alice() -> Requester {
    Requester::new(100, "alice")
}

/// Let every ready task run until the runtime is idle
///
/// Under a paused clock the runtime only auto-advances once nothing else
/// can make progress, so a 1ms sleep returns after spawned work settles.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Scheduler wired to fakes, with an event subscription
pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub transport: Arc<FakeTransport>,
    pub resolver: Arc<FakeResolver>,
    pub state: Arc<SharedState>,
    events: broadcast::Receiver<RoomEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_idle_timeout(Duration::from_secs(300))
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let transport = Arc::new(FakeTransport::new());
        let resolver = Arc::new(FakeResolver::new());
        let state = Arc::new(SharedState::new());
        let events = state.subscribe_events();
        let scheduler = Arc::new(Scheduler::new(
            transport.clone(),
            resolver.clone(),
            state.clone(),
            idle_timeout,
        ));
        Self {
            scheduler,
            transport,
            resolver,
            state,
            events,
        }
    }

    pub async fn join(&self) -> JoinOutcome {
        self.scheduler.join(ROOM, general()).await.unwrap()
    }

    /// Enqueue `query` for alice in the default room
    pub async fn play(&self, query: &str) -> EnqueueOutcome {
        self.scheduler
            .enqueue(ROOM, query, alice(), Some(general()))
            .await
            .unwrap()
    }

    pub async fn snapshot(&self) -> RoomSnapshot {
        self.scheduler.snapshot(ROOM).await.unwrap()
    }

    pub async fn queued_titles(&self) -> Vec<String> {
        self.scheduler
            .queue(ROOM, usize::MAX)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    /// Events received since the last call
    pub fn drain_events(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn event_types(&mut self) -> Vec<&'static str> {
        self.drain_events().iter().map(|e| e.event_type()).collect()
    }
}
