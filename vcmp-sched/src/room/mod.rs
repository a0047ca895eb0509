//! Per-room playback state
//!
//! Each live room is owned by one controller task. Every intent for the room
//! (user commands, transport callbacks, timer fires, stream resolution
//! results) passes through that task's channel, so room state transitions
//! never interleave.

pub mod controller;
pub mod idle_timer;
pub mod intent;
pub mod queue;
pub mod registry;

use crate::resolver::ResolvedTrack;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use idle_timer::IdleTimer;
pub use intent::{
    EnqueueOutcome, JoinOutcome, LeaveOutcome, NowPlaying, QueueListing, RoomSnapshot,
    StopOutcome,
};
pub use queue::Queue;
pub use registry::{RoomHandle, RoomRegistry};

/// Stable identifier of a room (one per chat server)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u64);

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room {}", self.0)
    }
}

/// User who asked for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: u64,
    pub display_name: String,
}

impl Requester {
    pub fn new(id: u64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// One queued track
///
/// Immutable once built. `source` is what gets re-resolved into a stream
/// when the track is about to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRequest {
    pub entry_id: Uuid,
    pub source: String,
    pub title: String,
    pub canonical_url: String,
    /// 0 when unknown
    pub duration_secs: u64,
    pub requester: Requester,
}

impl TrackRequest {
    /// Build a request from a resolved lookup
    pub fn from_resolved(resolved: &ResolvedTrack, requester: Requester) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            source: resolved.canonical_url.clone(),
            title: resolved.title.clone(),
            canonical_url: resolved.canonical_url.clone(),
            duration_secs: resolved.duration_secs,
            requester,
        }
    }
}
