//! HTTP request handlers

use crate::api::server::AppContext;
use crate::commands::CommandContext;
use crate::error::SchedulerError;
use crate::room::{Requester, RoomId, RoomSnapshot};
use crate::transport::ChannelRef;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub rooms: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// A chat message addressed to a room
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandRequest {
    pub text: String,
    pub user_id: u64,
    pub user_name: String,
    /// Voice channel the user is sitting in
    #[serde(default)]
    pub voice_channel: Option<ChannelRef>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomId>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Liveness check
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "vcmp-sched".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rooms: ctx.scheduler.rooms().len(),
        uptime_secs: ctx.state.uptime_secs(),
    })
}

// ============================================================================
// Room Endpoints
// ============================================================================

/// GET /rooms - Ids of live rooms
pub async fn list_rooms(State(ctx): State<AppContext>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: ctx.scheduler.rooms(),
    })
}

/// GET /rooms/:room_id - Snapshot of one room
pub async fn get_room(
    State(ctx): State<AppContext>,
    Path(room_id): Path<u64>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    match ctx.scheduler.snapshot(RoomId(room_id)).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(SchedulerError::NotInRoom) => Err((
            StatusCode::NOT_FOUND,
            Json(StatusResponse::new(format!("No live room {}", room_id))),
        )),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusResponse::new(e.to_string())),
        )),
    }
}

/// POST /rooms/:room_id/commands - Run one text command
pub async fn run_command(
    State(ctx): State<AppContext>,
    Path(room_id): Path<u64>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command_ctx = CommandContext {
        room_id: RoomId(room_id),
        requester: Requester::new(req.user_id, req.user_name),
        voice_channel: req.voice_channel,
    };

    match ctx.commands.handle_text(&command_ctx, &req.text).await {
        Some(reply) => {
            info!("[{}] {} -> {}", command_ctx.room_id, req.text, reply.replace('\n', " | "));
            Ok(Json(CommandResponse { reply }))
        }
        None => {
            warn!("[{}] Ignoring non-command text", command_ctx.room_id);
            Err((
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::new(format!(
                    "Not a command (expected prefix `{}`)",
                    ctx.commands.prefix()
                ))),
            ))
        }
    }
}
