//! Voice transport collaborator
//!
//! The transport owns the actual audio connection to a voice channel and
//! streams audio frames. The scheduler only drives it through
//! [`VoiceTransport`]; it never touches audio data.
//!
//! Contract for [`VoiceTransport::play`]: `on_finished` is invoked exactly
//! once per successful `play` call, asynchronously, whether the stream ended
//! naturally, failed, or was cut short by `stop`/`disconnect`.

pub mod simulated;

use crate::room::RoomId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use simulated::SimulatedTransport;

/// A voice channel inside a room
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: u64,
    pub name: String,
}

impl ChannelRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Opaque handle to an established voice connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub room_id: RoomId,
    pub session_id: Uuid,
}

/// Playable stream produced by media resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef {
    /// Direct media URL
    pub url: String,
    /// Expected length in seconds (0 when unknown)
    pub duration_secs: u64,
}

/// Completion callback handed to [`VoiceTransport::play`]
///
/// Receives `None` for a clean end (including stop/skip) and
/// `Some(error)` when streaming failed mid-way.
pub type OnFinished = Box<dyn FnOnce(Option<TransportError>) + Send + 'static>;

/// Transport failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Already connected to a voice channel in this server")]
    AlreadyConnected,

    #[error("Missing permission to join or speak in the voice channel")]
    PermissionDenied,

    #[error("Timed out trying to connect to voice channel")]
    ConnectTimeout,

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Already playing audio")]
    AlreadyPlaying,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Audio connection operations used by the scheduler
///
/// Implementations must tolerate `stop`/`pause`/`resume` when nothing is
/// playing (no-op).
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Open a voice connection for `room_id` in `channel`
    async fn connect(
        &self,
        room_id: RoomId,
        channel: &ChannelRef,
    ) -> Result<ConnectionHandle, TransportError>;

    /// Move an existing connection to another channel of the same room
    async fn move_to(
        &self,
        handle: &ConnectionHandle,
        channel: &ChannelRef,
    ) -> Result<(), TransportError>;

    /// Close the connection. Any active stream finishes (callback fires).
    async fn disconnect(&self, handle: &ConnectionHandle);

    /// Start streaming; `on_finished` fires exactly once, asynchronously
    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream: StreamRef,
        on_finished: OnFinished,
    ) -> Result<(), TransportError>;

    /// Stop the active stream; triggers its `on_finished`
    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError>;

    async fn is_playing(&self, handle: &ConnectionHandle) -> bool;

    async fn is_paused(&self, handle: &ConnectionHandle) -> bool;
}
