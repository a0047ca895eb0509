//! Clock-driven stand-in for a real voice connection
//!
//! Streams "play" for the duration reported by media resolution and then
//! finish. Used when the service runs without a chat gateway attached, and
//! handy for exercising the scheduler end to end.

use super::{ChannelRef, ConnectionHandle, OnFinished, StreamRef, TransportError, VoiceTransport};
use crate::room::RoomId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Playback length assumed for streams of unknown duration
const UNKNOWN_DURATION: Duration = Duration::from_secs(180);

struct SimStream {
    play_id: u64,
    on_finished: OnFinished,
    remaining: Duration,
    resumed_at: Instant,
    /// None while paused
    finish_task: Option<JoinHandle<()>>,
}

struct SimSession {
    room_id: RoomId,
    channel: ChannelRef,
    stream: Option<SimStream>,
}

type Sessions = Arc<Mutex<HashMap<Uuid, SimSession>>>;

/// Simulated voice transport
#[derive(Clone, Default)]
pub struct SimulatedTransport {
    sessions: Sessions,
    next_play_id: Arc<std::sync::atomic::AtomicU64>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn_finish(sessions: Sessions, session_id: Uuid, play_id: u64, after: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let callback = {
                let mut guard = lock(&sessions);
                let session = match guard.get_mut(&session_id) {
                    Some(s) => s,
                    None => return,
                };
                match session.stream.take() {
                    Some(stream) if stream.play_id == play_id => Some(stream.on_finished),
                    other => {
                        session.stream = other;
                        None
                    }
                }
            };
            if let Some(on_finished) = callback {
                debug!("Simulated stream {} reached its end", play_id);
                on_finished(None);
            }
        })
    }

    /// Remove the active stream and fire its callback on a separate task
    fn finish_now(stream: SimStream) {
        if let Some(task) = stream.finish_task {
            task.abort();
        }
        let on_finished = stream.on_finished;
        tokio::spawn(async move {
            on_finished(None);
        });
    }
}

fn lock(sessions: &Sessions) -> std::sync::MutexGuard<'_, HashMap<Uuid, SimSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl VoiceTransport for SimulatedTransport {
    async fn connect(
        &self,
        room_id: RoomId,
        channel: &ChannelRef,
    ) -> Result<ConnectionHandle, TransportError> {
        let mut sessions = lock(&self.sessions);
        if sessions.values().any(|s| s.room_id == room_id) {
            return Err(TransportError::AlreadyConnected);
        }

        let session_id = Uuid::new_v4();
        sessions.insert(
            session_id,
            SimSession {
                room_id,
                channel: channel.clone(),
                stream: None,
            },
        );
        info!("[{}] Simulated connection to channel {}", room_id, channel.name);
        Ok(ConnectionHandle {
            room_id,
            session_id,
        })
    }

    async fn move_to(
        &self,
        handle: &ConnectionHandle,
        channel: &ChannelRef,
    ) -> Result<(), TransportError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(&handle.session_id)
            .ok_or(TransportError::NotConnected)?;
        info!(
            "[{}] Simulated move from {} to {}",
            handle.room_id, session.channel.name, channel.name
        );
        session.channel = channel.clone();
        Ok(())
    }

    async fn disconnect(&self, handle: &ConnectionHandle) {
        let removed = lock(&self.sessions).remove(&handle.session_id);
        if let Some(session) = removed {
            if let Some(stream) = session.stream {
                Self::finish_now(stream);
            }
            info!("[{}] Simulated connection closed", handle.room_id);
        }
    }

    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream: StreamRef,
        on_finished: OnFinished,
    ) -> Result<(), TransportError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(&handle.session_id)
            .ok_or(TransportError::NotConnected)?;
        if session.stream.is_some() {
            return Err(TransportError::AlreadyPlaying);
        }

        let length = if stream.duration_secs == 0 {
            UNKNOWN_DURATION
        } else {
            Duration::from_secs(stream.duration_secs)
        };
        let play_id = self
            .next_play_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let task = Self::spawn_finish(self.sessions.clone(), handle.session_id, play_id, length);

        debug!("[{}] Simulated play of {} ({:?})", handle.room_id, stream.url, length);
        session.stream = Some(SimStream {
            play_id,
            on_finished,
            remaining: length,
            resumed_at: Instant::now(),
            finish_task: Some(task),
        });
        Ok(())
    }

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let stream = {
            let mut sessions = lock(&self.sessions);
            let session = sessions
                .get_mut(&handle.session_id)
                .ok_or(TransportError::NotConnected)?;
            session.stream.take()
        };
        if let Some(stream) = stream {
            Self::finish_now(stream);
        }
        Ok(())
    }

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(&handle.session_id)
            .ok_or(TransportError::NotConnected)?;
        if let Some(stream) = session.stream.as_mut() {
            if let Some(task) = stream.finish_task.take() {
                task.abort();
                stream.remaining = stream.remaining.saturating_sub(stream.resumed_at.elapsed());
            }
        }
        Ok(())
    }

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(&handle.session_id)
            .ok_or(TransportError::NotConnected)?;
        if let Some(stream) = session.stream.as_mut() {
            if stream.finish_task.is_none() {
                stream.resumed_at = Instant::now();
                stream.finish_task = Some(Self::spawn_finish(
                    self.sessions.clone(),
                    handle.session_id,
                    stream.play_id,
                    stream.remaining,
                ));
            }
        }
        Ok(())
    }

    async fn is_playing(&self, handle: &ConnectionHandle) -> bool {
        lock(&self.sessions)
            .get(&handle.session_id)
            .and_then(|s| s.stream.as_ref())
            .is_some_and(|s| s.finish_task.is_some())
    }

    async fn is_paused(&self, handle: &ConnectionHandle) -> bool {
        lock(&self.sessions)
            .get(&handle.session_id)
            .and_then(|s| s.stream.as_ref())
            .is_some_and(|s| s.finish_task.is_none())
    }
}
