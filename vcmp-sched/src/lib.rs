//! # VCMP Scheduler
//!
//! Per-room music playback scheduler for chat voice channels.
//!
//! Each room (one per chat server) gets an independent FIFO queue and a
//! playback controller task that decides what plays next, drives the voice
//! transport, and leaves the channel after a period of inactivity.
//!
//! **Module overview:**
//! - [`room`]: queue, idle timer, registry and the per-room controller
//! - [`scheduler`]: routes intents to the right room
//! - [`transport`], [`resolver`]: collaborator traits and their implementations
//! - [`commands`]: text command parsing and reply formatting
//! - [`api`]: HTTP intake, room views and SSE events

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod resolver;
pub mod room;
pub mod scheduler;
pub mod state;
pub mod transport;

pub use error::{Error, Result, SchedulerError};
pub use scheduler::Scheduler;
pub use state::SharedState;
