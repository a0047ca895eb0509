//! HTTP API
//!
//! Thin intake for driving the scheduler without a chat gateway: text
//! commands per room, read-only room views, an SSE event stream and a
//! liveness check.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
