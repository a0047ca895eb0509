//! Error types for vcmp-sched
//!
//! Two layers:
//! - [`Error`] covers service plumbing (configuration, HTTP server, I/O).
//! - [`SchedulerError`] is the outcome of a rejected room intent. Every
//!   variant renders as a message that can be sent back to the requester.

use crate::transport::TransportError;
use thiserror::Error;

/// Main error type for the vcmp-sched service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] vcmp_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File or socket I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using vcmp-sched Error
pub type Result<T> = std::result::Result<T, Error>;

/// Rejection or failure of a room intent
///
/// `ResolutionFailed` and `PlaybackError` never stop a room: playback moves
/// on to the next queued track. The validation variants leave room state
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The command needs an active voice connection and there is none
    #[error("I am not currently in a voice channel.")]
    NotInRoom,

    /// Nothing is playing or paused
    #[error("Nothing is currently playing.")]
    NothingPlaying,

    /// Pause/resume issued in the wrong state
    #[error("{0}")]
    InvalidState(String),

    /// Queue position outside [1, len]
    #[error("Invalid index {index}. Please provide a number between 1 and {len}.")]
    IndexOutOfRange { index: usize, len: usize },

    /// The queue has nothing to act on
    #[error("The queue is already empty.")]
    QueueEmpty,

    /// Media lookup or stream resolution failed
    #[error("Could not find or process that URL/query: {0}")]
    ResolutionFailed(String),

    /// The transport failed while streaming or while handling a control call
    #[error("An error occurred during playback: {0}")]
    PlaybackError(String),

    /// Joining the voice channel failed; no room was created
    #[error("Could not join voice channel: {0}")]
    ConnectFailure(TransportError),

    /// The scheduler is shutting down
    #[error("The player is shutting down.")]
    Shutdown,
}

impl From<TransportError> for SchedulerError {
    fn from(e: TransportError) -> Self {
        SchedulerError::PlaybackError(e.to_string())
    }
}
