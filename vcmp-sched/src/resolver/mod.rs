//! Media resolution collaborator
//!
//! Turns a URL or free-text search query into track metadata plus a
//! playable stream. Resolution may be slow (network, subprocess), so the
//! scheduler always calls it outside a room's serialized context.

pub mod ytdlp;

use crate::transport::StreamRef;
use async_trait::async_trait;
use thiserror::Error;

pub use ytdlp::YtDlpResolver;

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub title: String,
    /// Stable page URL; re-resolved when the track is about to play
    pub canonical_url: String,
    /// 0 when unknown
    pub duration_secs: u64,
    pub stream: StreamRef,
}

/// Resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no playable media found: {0}")]
    NotFound(String),

    #[error("media lookup timed out")]
    Timeout,

    #[error("media resolver unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected resolver output: {0}")]
    Malformed(String),
}

/// Media lookup used by the scheduler
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError>;
}
