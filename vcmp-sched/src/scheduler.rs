//! Scheduler - routes intents to room controllers
//!
//! The scheduler is the entry point used by the command layer and the HTTP
//! API. It never touches room state: it finds (or creates) the room's
//! controller through the [`RoomRegistry`] and sends it one intent per call.
//! Media lookups for `enqueue` happen here, in the caller's task, so a slow
//! resolver never blocks other intents for the same room.

use crate::error::SchedulerError;
use crate::resolver::TrackResolver;
use crate::room::controller::{RoomController, RoomServices};
use crate::room::intent::Intent;
use crate::room::{
    EnqueueOutcome, JoinOutcome, LeaveOutcome, NowPlaying, QueueListing, Requester, RoomHandle,
    RoomId, RoomRegistry, RoomSnapshot, StopOutcome, TrackRequest,
};
use crate::state::SharedState;
use crate::transport::{ChannelRef, VoiceTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Top-level routing of room intents
pub struct Scheduler {
    registry: Arc<RoomRegistry>,
    services: RoomServices,
    shutting_down: AtomicBool,
}

impl Scheduler {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn TrackResolver>,
        state: Arc<SharedState>,
        idle_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let services = RoomServices {
            transport,
            resolver,
            state,
            registry: registry.clone(),
            idle_timeout,
        };
        Self {
            registry,
            services,
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.services.state
    }

    /// Ids of all live rooms
    pub fn rooms(&self) -> Vec<RoomId> {
        self.registry.room_ids()
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.shutting_down.load(Ordering::Acquire) {
            Err(SchedulerError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Existing room, without creating one
    fn room(&self, room_id: RoomId) -> Result<RoomHandle, SchedulerError> {
        self.ensure_running()?;
        self.registry.get(room_id).ok_or(SchedulerError::NotInRoom)
    }

    fn room_or_spawn(&self, room_id: RoomId) -> RoomHandle {
        self.registry.get_or_create(room_id, |instance, predecessor| {
            RoomController::spawn(room_id, instance, predecessor, self.services.clone())
        })
    }

    /// Join `channel`, or move there if the room is connected elsewhere
    ///
    /// A failed connect leaves no room behind.
    pub async fn join(
        &self,
        room_id: RoomId,
        channel: ChannelRef,
    ) -> Result<JoinOutcome, SchedulerError> {
        self.ensure_running()?;
        self.room_or_spawn(room_id)
            .request(|reply| Intent::Join { channel, reply })
            .await
    }

    /// Stop playback, drop the queue and disconnect
    pub async fn leave(&self, room_id: RoomId) -> Result<LeaveOutcome, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Leave { reply })
            .await
    }

    /// Resolve `query` and add it to the room
    ///
    /// When the room has no connection yet, `channel` (the requester's voice
    /// channel) is joined first; without one the request is `NotInRoom`.
    pub async fn enqueue(
        &self,
        room_id: RoomId,
        query: &str,
        requester: Requester,
        channel: Option<ChannelRef>,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        self.ensure_running()?;

        let handle = match self.registry.get(room_id) {
            Some(handle) => handle,
            None => {
                let channel = channel.ok_or(SchedulerError::NotInRoom)?;
                info!("[{}] Not connected, joining {} first", room_id, channel.name);
                self.join(room_id, channel).await?;
                self.room(room_id)?
            }
        };

        let resolved = self.services.resolver.resolve(query).await.map_err(|e| {
            warn!("[{}] Could not resolve '{}': {}", room_id, query, e);
            SchedulerError::ResolutionFailed(e.to_string())
        })?;
        let track = TrackRequest::from_resolved(&resolved, requester);

        handle
            .request(|reply| Intent::Enqueue { track, reply })
            .await
    }

    /// Stop the current track; the next queued one follows
    pub async fn skip(&self, room_id: RoomId) -> Result<TrackRequest, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Skip { reply })
            .await
    }

    /// Stop the current track and clear the queue
    pub async fn stop(&self, room_id: RoomId) -> Result<StopOutcome, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Stop { reply })
            .await
    }

    pub async fn pause(&self, room_id: RoomId) -> Result<TrackRequest, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Pause { reply })
            .await
    }

    pub async fn resume(&self, room_id: RoomId) -> Result<TrackRequest, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Resume { reply })
            .await
    }

    /// Remove the queued track at 1-based `position`
    pub async fn remove(
        &self,
        room_id: RoomId,
        position: usize,
    ) -> Result<TrackRequest, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Remove { position, reply })
            .await
    }

    /// Drop all queued tracks; the current one keeps playing
    pub async fn clear_queue(&self, room_id: RoomId) -> Result<usize, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::ClearQueue { reply })
            .await
    }

    /// Up to `limit` queued tracks in play order
    pub async fn queue(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<QueueListing, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::ListQueue { limit, reply })
            .await
    }

    pub async fn now_playing(&self, room_id: RoomId) -> Result<NowPlaying, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::NowPlaying { reply })
            .await
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, SchedulerError> {
        self.room(room_id)?
            .request(|reply| Intent::Snapshot { reply })
            .await
    }

    /// Refuse new intents and leave every room
    ///
    /// Returns the number of rooms that were left.
    pub async fn shutdown(&self) -> usize {
        self.shutting_down.store(true, Ordering::Release);

        let mut left = 0;
        for room_id in self.registry.room_ids() {
            let Some(handle) = self.registry.get(room_id) else {
                continue;
            };
            match handle.request(|reply| Intent::Leave { reply }).await {
                Ok(_) => left += 1,
                Err(e) => warn!("[{}] Leave during shutdown failed: {}", room_id, e),
            }
        }
        info!("Scheduler shut down, {} room(s) left", left);
        left
    }
}
