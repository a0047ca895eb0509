//! HTTP server setup and routing

use crate::commands::CommandRouter;
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use vcmp_common::config::SchedulerConfig;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub scheduler: Arc<Scheduler>,
    pub commands: Arc<CommandRouter>,
}

impl AppContext {
    /// Wire a context around an existing scheduler
    pub fn new(scheduler: Arc<Scheduler>, config: &SchedulerConfig) -> Self {
        let commands = CommandRouter::new(
            scheduler.clone(),
            config.command_prefix.clone(),
            config.queue_display_limit,
        );
        Self {
            state: scheduler.state().clone(),
            scheduler,
            commands: Arc::new(commands),
        }
    }
}

/// Build the router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Rooms
        .route("/rooms", get(super::handlers::list_rooms))
        .route("/rooms/:room_id", get(super::handlers::get_room))
        .route("/rooms/:room_id/commands", post(super::handlers::run_command))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(config: &SchedulerConfig, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
