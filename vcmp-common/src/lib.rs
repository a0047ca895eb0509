//! # VCMP Common Library
//!
//! Shared code for the VCMP voice channel music player:
//! - Configuration loading and resolution
//! - Room event types (RoomEvent enum)
//! - Error types
//! - Human-readable duration formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
pub use events::RoomEvent;
