//! Room event types
//!
//! Events are emitted by a room's playback controller when something happens
//! that nobody explicitly asked about: the next track starting, a track
//! failing, the queue running dry, or the room being left for inactivity.
//! They are broadcast to every subscriber and can be serialized for SSE.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback state as seen by observers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing
    Idle,
    /// A track is current and audible (or loading)
    Playing,
    /// A track is current but paused
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Asynchronous notifications about a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RoomEvent {
    /// A track began streaming
    TrackStarted {
        room_id: u64,
        entry_id: Uuid,
        title: String,
        requester: String,
        /// False when the track bypassed the queue; the requester was
        /// already answered directly, so nothing is announced
        from_queue: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track could not be resolved to a playable stream and was dropped
    TrackFailed {
        room_id: u64,
        entry_id: Uuid,
        title: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The transport reported an error while a track was streaming
    PlaybackError {
        room_id: u64,
        title: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback state changed (Idle, Playing, Paused)
    PlaybackStateChanged {
        room_id: u64,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The queue ran out; the idle timer is now armed
    QueueFinished {
        room_id: u64,
        /// Whether the last attempt ended in an error
        after_error: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The room was left because nothing happened for `idle_secs`
    IdleDisconnected {
        room_id: u64,
        idle_secs: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The room was torn down (manual leave or shutdown)
    RoomClosed {
        room_id: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RoomEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::TrackStarted { .. } => "TrackStarted",
            RoomEvent::TrackFailed { .. } => "TrackFailed",
            RoomEvent::PlaybackError { .. } => "PlaybackError",
            RoomEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            RoomEvent::QueueFinished { .. } => "QueueFinished",
            RoomEvent::IdleDisconnected { .. } => "IdleDisconnected",
            RoomEvent::RoomClosed { .. } => "RoomClosed",
        }
    }

    /// Room the event belongs to
    pub fn room_id(&self) -> u64 {
        match self {
            RoomEvent::TrackStarted { room_id, .. }
            | RoomEvent::TrackFailed { room_id, .. }
            | RoomEvent::PlaybackError { room_id, .. }
            | RoomEvent::PlaybackStateChanged { room_id, .. }
            | RoomEvent::QueueFinished { room_id, .. }
            | RoomEvent::IdleDisconnected { room_id, .. }
            | RoomEvent::RoomClosed { room_id, .. } => *room_id,
        }
    }

    /// Chat-facing text for the event, if it should be announced
    pub fn announcement(&self) -> Option<String> {
        match self {
            RoomEvent::TrackStarted {
                title,
                requester,
                from_queue,
                ..
            } => from_queue.then(|| {
                format!("Now playing: **{}** (Requested by: {})", title, requester)
            }),
            RoomEvent::TrackFailed { title, reason, .. } => {
                Some(format!("Error playing **{}**: {}", title, reason))
            }
            RoomEvent::PlaybackError { reason, .. } => {
                Some(format!("An error occurred during playback: {}", reason))
            }
            RoomEvent::QueueFinished { after_error, .. } => Some(if *after_error {
                "Queue finished or an error occurred with the last song.".to_string()
            } else {
                "Queue finished. I will disconnect if idle.".to_string()
            }),
            RoomEvent::IdleDisconnected { idle_secs, .. } => Some(format!(
                "No activity for {} minutes. Leaving voice channel.",
                idle_secs / 60
            )),
            RoomEvent::PlaybackStateChanged { .. } | RoomEvent::RoomClosed { .. } => None,
        }
    }
}
