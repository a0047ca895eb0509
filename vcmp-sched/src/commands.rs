//! Text command layer
//!
//! Parses prefixed chat commands (`!play never gonna`, `!q`, `!remove 2`)
//! into [`Command`]s, runs each as exactly one scheduler call, and renders
//! the outcome as the reply text sent back to the requester.

use crate::error::SchedulerError;
use crate::room::{EnqueueOutcome, JoinOutcome, NowPlaying, QueueListing, Requester, RoomId};
use crate::scheduler::Scheduler;
use crate::transport::{ChannelRef, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use vcmp_common::events::PlaybackState;
use vcmp_common::human_time::{format_progress, format_track_time};

/// One user command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Play { query: String },
    Pause,
    Resume,
    Stop,
    Skip,
    Queue,
    NowPlaying,
    /// 1-based queue position; 0 for anything below 1
    Remove { position: usize },
    ClearQueue,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Join => "join",
            Command::Leave => "leave",
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Skip => "skip",
            Command::Queue => "queue",
            Command::NowPlaying => "nowplaying",
            Command::Remove { .. } => "remove",
            Command::ClearQueue => "clearqueue",
        }
    }
}

/// Command text that could not be turned into a [`Command`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Error: Missing argument. Usage: `{prefix}{usage}`")]
    MissingArgument { prefix: String, usage: &'static str },

    #[error("Error: `{value}` is not a number. Usage: `{prefix}{usage}`")]
    NotANumber {
        prefix: String,
        usage: &'static str,
        value: String,
    },

    #[error("Unknown command `{0}`.")]
    Unknown(String),
}

const PLAY_USAGE: &str = "play <url or search query>";
const REMOVE_USAGE: &str = "remove <number>";

/// Parse `text` as a command
///
/// Returns `None` when the text is not a command at all (no prefix, or the
/// bare prefix).
pub fn parse(prefix: &str, text: &str) -> Option<Result<Command, ParseError>> {
    let body = text.trim().strip_prefix(prefix)?;
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }

    let missing = |usage| ParseError::MissingArgument {
        prefix: prefix.to_string(),
        usage,
    };

    let command = match name.to_lowercase().as_str() {
        "join" => Command::Join,
        "leave" => Command::Leave,
        "play" => {
            if rest.is_empty() {
                return Some(Err(missing(PLAY_USAGE)));
            }
            Command::Play {
                query: rest.to_string(),
            }
        }
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "skip" => Command::Skip,
        "queue" | "q" => Command::Queue,
        "nowplaying" | "np" | "current" => Command::NowPlaying,
        "remove" => {
            let Some(arg) = rest.split_whitespace().next() else {
                return Some(Err(missing(REMOVE_USAGE)));
            };
            match arg.parse::<i64>() {
                Ok(n) => Command::Remove {
                    position: usize::try_from(n).unwrap_or(0),
                },
                Err(_) => {
                    return Some(Err(ParseError::NotANumber {
                        prefix: prefix.to_string(),
                        usage: REMOVE_USAGE,
                        value: arg.to_string(),
                    }))
                }
            }
        }
        "clearqueue" | "cq" => Command::ClearQueue,
        other => return Some(Err(ParseError::Unknown(other.to_string()))),
    };
    Some(Ok(command))
}

/// Who issued a command, and from where
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub room_id: RoomId,
    pub requester: Requester,
    /// Voice channel the requester is currently in, if any
    pub voice_channel: Option<ChannelRef>,
}

/// Runs commands against the scheduler and formats replies
pub struct CommandRouter {
    scheduler: Arc<Scheduler>,
    prefix: String,
    queue_display_limit: usize,
}

impl CommandRouter {
    pub fn new(
        scheduler: Arc<Scheduler>,
        prefix: impl Into<String>,
        queue_display_limit: usize,
    ) -> Self {
        Self {
            scheduler,
            prefix: prefix.into(),
            queue_display_limit,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Parse and run a chat message; `None` if it was not a command
    pub async fn handle_text(&self, ctx: &CommandContext, text: &str) -> Option<String> {
        match parse(&self.prefix, text)? {
            Ok(command) => Some(self.execute(ctx, command).await),
            Err(e) => Some(e.to_string()),
        }
    }

    /// Run one command and render its reply
    pub async fn execute(&self, ctx: &CommandContext, command: Command) -> String {
        debug!(
            "[{}] Command '{}' from {}",
            ctx.room_id,
            command.name(),
            ctx.requester.display_name
        );
        let scheduler = &self.scheduler;
        let room_id = ctx.room_id;

        match command {
            Command::Join => {
                let Some(channel) = ctx.voice_channel.clone() else {
                    return format!(
                        "{}, you need to be in a voice channel for me to join.",
                        ctx.requester.display_name
                    );
                };
                match scheduler.join(room_id, channel).await {
                    Ok(JoinOutcome::Joined { channel }) => format!("Joined **{}**.", channel.name),
                    Ok(JoinOutcome::Moved { channel }) => format!("Moved to **{}**.", channel.name),
                    Ok(JoinOutcome::AlreadyJoined { channel }) => {
                        format!("I'm already in **{}**.", channel.name)
                    }
                    Err(SchedulerError::ConnectFailure(TransportError::ConnectTimeout)) => {
                        "Timed out trying to connect to voice channel.".to_string()
                    }
                    Err(SchedulerError::ConnectFailure(e)) => format!(
                        "Could not join voice channel: `{}`. Make sure I have permissions.",
                        e
                    ),
                    Err(e) => e.to_string(),
                }
            }

            Command::Leave => match scheduler.leave(room_id).await {
                Ok(outcome) if outcome.cleared > 0 => {
                    "Queue cleared.\nLeft the voice channel.".to_string()
                }
                Ok(_) => "Left the voice channel.".to_string(),
                Err(e) => e.to_string(),
            },

            Command::Play { query } => {
                let searching = format!("Searching for **{}**...", query);
                let result = scheduler
                    .enqueue(
                        room_id,
                        &query,
                        ctx.requester.clone(),
                        ctx.voice_channel.clone(),
                    )
                    .await;
                let reply = match result {
                    Ok(EnqueueOutcome::Started { track }) => format!(
                        "Now playing: **{}** (Requested by: {})",
                        track.title, track.requester.display_name
                    ),
                    Ok(EnqueueOutcome::Queued { track, position }) => format!(
                        "Added **{}** to the queue. Position: `{}`.",
                        track.title, position
                    ),
                    Err(SchedulerError::NotInRoom) => {
                        return format!(
                            "{}, you need to be in a voice channel for me to play music.",
                            ctx.requester.display_name
                        )
                    }
                    Err(SchedulerError::ConnectFailure(_)) => {
                        return format!(
                            "I couldn't join your voice channel. Please try `{}join` first manually if problems persist.",
                            self.prefix
                        )
                    }
                    Err(SchedulerError::ResolutionFailed(reason)) => format!(
                        "Could not find or process that URL/query: `{}`. Please try a different one.",
                        reason
                    ),
                    Err(e) => e.to_string(),
                };
                format!("{}\n{}", searching, reply)
            }

            Command::Pause => match scheduler.pause(room_id).await {
                Ok(_) => "Playback paused.".to_string(),
                Err(e) => e.to_string(),
            },

            Command::Resume => match scheduler.resume(room_id).await {
                Ok(_) => "Playback resumed.".to_string(),
                Err(e) => e.to_string(),
            },

            Command::Stop => match scheduler.stop(room_id).await {
                Ok(outcome) if outcome.cleared > 0 => "Stopped playback.\nQueue cleared.".to_string(),
                Ok(_) => "Stopped playback.".to_string(),
                Err(SchedulerError::NotInRoom) => {
                    "I am not currently in a voice channel or playing anything.".to_string()
                }
                Err(e) => e.to_string(),
            },

            Command::Skip => match scheduler.skip(room_id).await {
                Ok(_) => "Skipped current song.".to_string(),
                Err(SchedulerError::NothingPlaying) => {
                    "No song is currently playing to skip.".to_string()
                }
                Err(e) => e.to_string(),
            },

            Command::Queue => match scheduler.queue(room_id, self.queue_display_limit).await {
                Ok(listing) if listing.total > 0 => format_queue(&listing),
                Ok(_) | Err(SchedulerError::NotInRoom) => format!(
                    "The queue is currently empty. Use `{}play` to add songs!",
                    self.prefix
                ),
                Err(e) => e.to_string(),
            },

            Command::NowPlaying => match scheduler.now_playing(room_id).await {
                Ok(now) => format_now_playing(&now),
                Err(SchedulerError::NotInRoom) => SchedulerError::NothingPlaying.to_string(),
                Err(e) => e.to_string(),
            },

            Command::Remove { position } => match scheduler.remove(room_id, position).await {
                Ok(track) => format!("Removed **{}** from the queue.", track.title),
                Err(SchedulerError::NotInRoom)
                | Err(SchedulerError::IndexOutOfRange { len: 0, .. }) => {
                    "The queue is empty, so there's nothing to remove.".to_string()
                }
                Err(SchedulerError::IndexOutOfRange { len, .. }) => format!(
                    "Invalid index. Please provide a number between 1 and {}.",
                    len
                ),
                Err(e) => e.to_string(),
            },

            Command::ClearQueue => match scheduler.clear_queue(room_id).await {
                Ok(_) => "The entire queue has been cleared.".to_string(),
                Err(SchedulerError::NotInRoom) | Err(SchedulerError::QueueEmpty) => {
                    SchedulerError::QueueEmpty.to_string()
                }
                Err(e) => e.to_string(),
            },
        }
    }
}

/// Render a queue listing as a numbered code block
pub fn format_queue(listing: &QueueListing) -> String {
    let lines: Vec<String> = listing
        .entries
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let duration = if track.duration_secs > 0 {
                format!(" (`{}`)", format_track_time(track.duration_secs))
            } else {
                String::new()
            };
            format!(
                "{}. {}{} (Requested by: {})",
                i + 1,
                track.title,
                duration,
                track.requester.display_name
            )
        })
        .collect();

    let mut response = format!("**Current Queue:**\n```\n{}\n```", lines.join("\n"));
    if listing.remaining() > 0 {
        response.push_str(&format!("\nAnd {} more songs...", listing.remaining()));
    }
    response
}

pub fn format_now_playing(now: &NowPlaying) -> String {
    let mut response = format!("**Now Playing:** `{}`\n", now.track.title);
    response.push_str(&format!("URL: <{}>\n", now.track.canonical_url));
    response.push_str(&format!(
        "Duration: `{}`\n",
        format_track_time(now.duration_secs)
    ));
    response.push_str(&format!(
        "Progress: `{}`{}\n",
        format_progress(now.elapsed_secs, now.duration_secs),
        if now.state == PlaybackState::Paused {
            " (paused)"
        } else {
            ""
        }
    ));
    response.push_str(&format!(
        "Requested by: {}\n",
        now.track.requester.display_name
    ));
    response
}
