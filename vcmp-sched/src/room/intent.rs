//! Intents delivered to a room controller and their outcomes

use super::{RoomId, TrackRequest};
use crate::error::SchedulerError;
use crate::resolver::ResolveError;
use crate::transport::{ChannelRef, StreamRef, TransportError};
use serde::Serialize;
use tokio::sync::oneshot;
use vcmp_common::events::PlaybackState;

/// Reply channel carried by user-issued intents
pub(crate) type Reply<T> = oneshot::Sender<Result<T, SchedulerError>>;

/// Everything a room controller reacts to
pub(crate) enum Intent {
    // User commands
    Join {
        channel: ChannelRef,
        reply: Reply<JoinOutcome>,
    },
    Leave {
        reply: Reply<LeaveOutcome>,
    },
    Enqueue {
        track: TrackRequest,
        reply: Reply<EnqueueOutcome>,
    },
    Skip {
        reply: Reply<TrackRequest>,
    },
    Stop {
        reply: Reply<StopOutcome>,
    },
    Pause {
        reply: Reply<TrackRequest>,
    },
    Resume {
        reply: Reply<TrackRequest>,
    },
    Remove {
        position: usize,
        reply: Reply<TrackRequest>,
    },
    ClearQueue {
        reply: Reply<usize>,
    },
    ListQueue {
        limit: usize,
        reply: Reply<QueueListing>,
    },
    NowPlaying {
        reply: Reply<NowPlaying>,
    },
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },

    // System events
    StreamResolved {
        play_token: u64,
        result: Result<StreamRef, ResolveError>,
    },
    PlaybackFinished {
        play_token: u64,
        error: Option<TransportError>,
    },
    IdleTimerFired {
        generation: u64,
    },
}

impl Intent {
    /// Short name for logging
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Intent::Join { .. } => "join",
            Intent::Leave { .. } => "leave",
            Intent::Enqueue { .. } => "enqueue",
            Intent::Skip { .. } => "skip",
            Intent::Stop { .. } => "stop",
            Intent::Pause { .. } => "pause",
            Intent::Resume { .. } => "resume",
            Intent::Remove { .. } => "remove",
            Intent::ClearQueue { .. } => "clearqueue",
            Intent::ListQueue { .. } => "queue",
            Intent::NowPlaying { .. } => "nowplaying",
            Intent::Snapshot { .. } => "snapshot",
            Intent::StreamResolved { .. } => "stream-resolved",
            Intent::PlaybackFinished { .. } => "playback-finished",
            Intent::IdleTimerFired { .. } => "idle-timer-fired",
        }
    }
}

/// Result of a join request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined { channel: ChannelRef },
    Moved { channel: ChannelRef },
    AlreadyJoined { channel: ChannelRef },
}

/// Result of a leave request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaveOutcome {
    /// Queued tracks dropped by leaving
    pub cleared: usize,
    /// Whether a track was stopped
    pub stopped: bool,
}

/// Result of an enqueue request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// The room was idle; the track bypassed the queue and is starting
    Started { track: TrackRequest },
    /// The track was appended at 1-based `position`
    Queued { track: TrackRequest, position: usize },
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub stopped: TrackRequest,
    pub cleared: usize,
}

/// First entries of a queue plus its full length
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueListing {
    pub entries: Vec<TrackRequest>,
    pub total: usize,
}

impl QueueListing {
    /// Entries beyond the listed ones
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.entries.len())
    }
}

/// Current track with progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlaying {
    pub track: TrackRequest,
    pub state: PlaybackState,
    pub elapsed_secs: u64,
    pub duration_secs: u64,
}

/// Point-in-time view of a room, for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub channel: Option<ChannelRef>,
    pub state: PlaybackState,
    pub current: Option<TrackRequest>,
    pub queue_len: usize,
    pub idle_timer_armed: bool,
    pub idle_generation: u64,
}
