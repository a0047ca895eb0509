//! vcmp-sched - Main entry point
//!
//! Runs the scheduler with the yt-dlp resolver and the simulated voice
//! transport, exposing the HTTP command intake and event stream.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vcmp_sched::api::{self, AppContext};
use vcmp_sched::config::{self, Args};
use vcmp_sched::resolver::YtDlpResolver;
use vcmp_sched::transport::SimulatedTransport;
use vcmp_sched::{Scheduler, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcmp_sched=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = config::load(&args).context("Failed to load configuration")?;

    info!("Starting vcmp-sched v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(SharedState::new());
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(SimulatedTransport::new()),
        Arc::new(
            YtDlpResolver::new(config.resolver_program.clone())
                .with_timeout(config.resolver_timeout()),
        ),
        state.clone(),
        config.idle_timeout(),
    ));

    tokio::spawn(log_announcements(state.clone()));

    let ctx = AppContext::new(scheduler.clone(), &config);
    api::run(&config, ctx, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let left = scheduler.shutdown().await;
    info!("Server shutdown complete ({} room(s) left)", left);
    Ok(())
}

/// Write chat-facing announcements to the log
///
/// Stands in for a chat gateway posting them to the room's text channel.
async fn log_announcements(state: Arc<SharedState>) {
    let mut rx = state.subscribe_events();
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(text) = event.announcement() {
                    info!("[room {}] >> {}", event.room_id(), text);
                }
            }
            Err(RecvError::Lagged(missed)) => warn!("Announcement log lagged, {} events missed", missed),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
