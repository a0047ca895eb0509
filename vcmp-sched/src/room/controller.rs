//! Playback controller - the state machine of one room
//!
//! **Responsibilities:**
//! - Own the room state (connection, queue, playback status, idle timer)
//! - Apply intents one at a time in arrival order
//! - Decide what plays next
//!
//! Transitions:
//! - Idle + enqueue: the track bypasses the queue and starts loading
//! - Loading + stream resolved: transport play, status becomes Playing
//! - Loading + resolution failed: report, try the next track
//! - Playing/Paused + finished (with or without error): next track, or Idle
//!   with the idle timer armed when the queue is empty
//! - Playing/Paused + skip/stop: transport stop only; the finished callback
//!   that follows drives the next transition
//! - Playing <-> Paused via pause/resume
//! - any + leave, or Idle + live idle-timer fire: tear the room down
//!
//! Stale asynchronous results are recognised by token: every track start
//! takes a new play token, and the idle timer hands out generations.

use super::idle_timer::IdleTimer;
use super::intent::{
    EnqueueOutcome, Intent, JoinOutcome, LeaveOutcome, NowPlaying, QueueListing, Reply,
    RoomSnapshot, StopOutcome,
};
use super::queue::Queue;
use super::registry::{PredecessorTeardown, RoomHandle, RoomRegistry};
use super::{RoomId, TrackRequest};
use crate::error::SchedulerError;
use crate::resolver::{ResolveError, TrackResolver};
use crate::state::SharedState;
use crate::transport::{ChannelRef, ConnectionHandle, OnFinished, StreamRef, TransportError, VoiceTransport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use vcmp_common::events::{PlaybackState, RoomEvent};

/// Collaborators shared by every room controller
#[derive(Clone)]
pub(crate) struct RoomServices {
    pub transport: Arc<dyn VoiceTransport>,
    pub resolver: Arc<dyn TrackResolver>,
    pub state: Arc<SharedState>,
    pub registry: Arc<RoomRegistry>,
    pub idle_timeout: Duration,
}

/// Track currently owned by the transport
#[derive(Debug, Clone)]
struct ActiveTrack {
    track: TrackRequest,
    started_at: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl ActiveTrack {
    fn new(track: TrackRequest) -> Self {
        Self {
            track,
            started_at: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    fn elapsed(&self) -> Duration {
        let end = self.paused_at.unwrap_or_else(Instant::now);
        end.saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total)
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }
}

/// Internal playback status
enum PlaybackStatus {
    Idle,
    /// Popped from the queue, stream being resolved
    Loading { track: TrackRequest, from_queue: bool },
    Playing(ActiveTrack),
    Paused(ActiveTrack),
}

impl PlaybackStatus {
    /// Observer-facing state; loading counts as playing
    fn state(&self) -> PlaybackState {
        match self {
            PlaybackStatus::Idle => PlaybackState::Idle,
            PlaybackStatus::Loading { .. } | PlaybackStatus::Playing(_) => PlaybackState::Playing,
            PlaybackStatus::Paused(_) => PlaybackState::Paused,
        }
    }

    fn current(&self) -> Option<&TrackRequest> {
        match self {
            PlaybackStatus::Idle => None,
            PlaybackStatus::Loading { track, .. } => Some(track),
            PlaybackStatus::Playing(active) | PlaybackStatus::Paused(active) => Some(&active.track),
        }
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Single owner of one room's state
pub(crate) struct RoomController {
    room_id: RoomId,
    instance: u64,
    services: RoomServices,
    /// Sender into this controller's own channel, for callbacks and timers
    tx: mpsc::UnboundedSender<Intent>,

    connection: Option<ConnectionHandle>,
    channel: Option<ChannelRef>,
    queue: Queue,
    status: PlaybackStatus,
    idle_timer: IdleTimer,

    /// Bumped on every track start and teardown
    play_token: u64,
    /// Tracks dropped in a row because they could not be played
    failure_streak: usize,
}

impl RoomController {
    /// Start a controller task for a new room and return its handle
    ///
    /// When an earlier instance of the room is still releasing its
    /// connection, no intent is handled until that finishes.
    pub(crate) fn spawn(
        room_id: RoomId,
        instance: u64,
        predecessor: Option<PredecessorTeardown>,
        services: RoomServices,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            room_id,
            instance,
            services,
            tx: tx.clone(),
            connection: None,
            channel: None,
            queue: Queue::new(),
            status: PlaybackStatus::Idle,
            idle_timer: IdleTimer::new(),
            play_token: 0,
            failure_streak: 0,
        };
        tokio::spawn(controller.run(predecessor, rx));
        RoomHandle::new(room_id, instance, tx)
    }

    async fn run(
        mut self,
        predecessor: Option<PredecessorTeardown>,
        mut rx: mpsc::UnboundedReceiver<Intent>,
    ) {
        debug!("[{}] Controller started (instance {})", self.room_id, self.instance);
        if let Some(predecessor) = predecessor {
            debug!("[{}] Waiting for previous instance to leave", self.room_id);
            predecessor.wait().await;
        }

        while let Some(intent) = rx.recv().await {
            debug!("[{}] Handling {} intent", self.room_id, intent.name());
            if let Flow::Exit = self.handle(intent).await {
                break;
            }
        }

        // Intents still buffered are dropped with the receiver; their
        // callers observe NotInRoom.
        rx.close();
        debug!("[{}] Controller stopped (instance {})", self.room_id, self.instance);
    }

    async fn handle(&mut self, intent: Intent) -> Flow {
        match intent {
            Intent::Join { channel, reply } => return self.join(channel, reply).await,
            Intent::Leave { reply } => {
                let outcome = self.teardown().await;
                let _ = reply.send(Ok(outcome));
                return Flow::Exit;
            }
            Intent::Enqueue { track, reply } => {
                let _ = reply.send(self.enqueue(track));
            }
            Intent::Skip { reply } => {
                let _ = reply.send(self.skip().await);
            }
            Intent::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Intent::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Intent::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            Intent::Remove { position, reply } => {
                let result = self.queue.remove_at(position);
                if let Ok(track) = &result {
                    info!("[{}] Removed '{}' from queue", self.room_id, track.title);
                }
                let _ = reply.send(result);
            }
            Intent::ClearQueue { reply } => {
                let result = if self.queue.is_empty() {
                    Err(SchedulerError::QueueEmpty)
                } else {
                    let cleared = self.queue.clear();
                    info!("[{}] Entire queue cleared ({} entries)", self.room_id, cleared);
                    Ok(cleared)
                };
                let _ = reply.send(result);
            }
            Intent::ListQueue { limit, reply } => {
                let _ = reply.send(Ok(QueueListing {
                    entries: self.queue.peek_first_n(limit).cloned().collect(),
                    total: self.queue.len(),
                }));
            }
            Intent::NowPlaying { reply } => {
                let _ = reply.send(self.now_playing());
            }
            Intent::Snapshot { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Intent::StreamResolved { play_token, result } => {
                self.on_stream_resolved(play_token, result).await;
            }
            Intent::PlaybackFinished { play_token, error } => {
                self.on_playback_finished(play_token, error);
            }
            Intent::IdleTimerFired { generation } => return self.on_idle_timer(generation).await,
        }
        Flow::Continue
    }

    // ------------------------------------------------------------------
    // User commands
    // ------------------------------------------------------------------

    async fn join(&mut self, channel: ChannelRef, reply: Reply<JoinOutcome>) -> Flow {
        if let Some(handle) = self.connection.clone() {
            let result = if self.channel.as_ref().map(|c| c.id) == Some(channel.id) {
                Ok(JoinOutcome::AlreadyJoined { channel })
            } else {
                match self.services.transport.move_to(&handle, &channel).await {
                    Ok(()) => {
                        info!("[{}] Moved to voice channel: {}", self.room_id, channel.name);
                        self.channel = Some(channel.clone());
                        Ok(JoinOutcome::Moved { channel })
                    }
                    Err(e) => {
                        warn!("[{}] Failed to move to {}: {}", self.room_id, channel.name, e);
                        Err(SchedulerError::ConnectFailure(e))
                    }
                }
            };
            let _ = reply.send(result);
            return Flow::Continue;
        }

        match self.services.transport.connect(self.room_id, &channel).await {
            Ok(handle) => {
                info!("[{}] Joined voice channel: {}", self.room_id, channel.name);
                self.connection = Some(handle);
                self.channel = Some(channel.clone());
                // A freshly joined room with nothing queued is idle
                self.arm_idle_timer();
                let _ = reply.send(Ok(JoinOutcome::Joined { channel }));
                Flow::Continue
            }
            Err(e) => {
                warn!("[{}] Could not join {}: {}", self.room_id, channel.name, e);
                self.services.registry.remove_instance(self.room_id, self.instance);
                let _ = reply.send(Err(SchedulerError::ConnectFailure(e)));
                Flow::Exit
            }
        }
    }

    fn enqueue(&mut self, track: TrackRequest) -> Result<EnqueueOutcome, SchedulerError> {
        if self.connection.is_none() {
            return Err(SchedulerError::NotInRoom);
        }

        if matches!(self.status, PlaybackStatus::Idle) && self.queue.is_empty() {
            info!("[{}] Playing immediately: {}", self.room_id, track.title);
            self.failure_streak = 0;
            self.start_track(track.clone(), false);
            return Ok(EnqueueOutcome::Started { track });
        }

        let position = self.queue.enqueue(track.clone());
        info!(
            "[{}] Added to queue: {} (position {})",
            self.room_id, track.title, position
        );
        Ok(EnqueueOutcome::Queued { track, position })
    }

    async fn skip(&mut self) -> Result<TrackRequest, SchedulerError> {
        let current = self
            .status
            .current()
            .cloned()
            .ok_or(SchedulerError::NothingPlaying)?;

        if matches!(self.status, PlaybackStatus::Loading { .. }) {
            // No stream yet, so no finished callback will come
            info!("[{}] Skipped '{}' while loading", self.room_id, current.title);
            self.play_token += 1;
            self.start_next(false);
            return Ok(current);
        }

        let handle = self.connection.clone().ok_or(SchedulerError::NotInRoom)?;
        self.services.transport.stop(&handle).await?;
        info!("[{}] Skipped current song: {}", self.room_id, current.title);
        Ok(current)
    }

    async fn stop(&mut self) -> Result<StopOutcome, SchedulerError> {
        let stopped = self
            .status
            .current()
            .cloned()
            .ok_or(SchedulerError::NothingPlaying)?;

        if matches!(self.status, PlaybackStatus::Loading { .. }) {
            let cleared = self.queue.clear();
            self.play_token += 1;
            info!("[{}] Playback stopped while loading, queue cleared", self.room_id);
            self.finish_queue(false);
            return Ok(StopOutcome { stopped, cleared });
        }

        let handle = self.connection.clone().ok_or(SchedulerError::NotInRoom)?;
        self.services.transport.stop(&handle).await?;
        let cleared = self.queue.clear();
        info!(
            "[{}] Playback stopped, {} queued entries cleared",
            self.room_id, cleared
        );
        Ok(StopOutcome { stopped, cleared })
    }

    async fn pause(&mut self) -> Result<TrackRequest, SchedulerError> {
        let track = match &self.status {
            PlaybackStatus::Playing(active) => active.track.clone(),
            PlaybackStatus::Loading { .. } => {
                return Err(SchedulerError::InvalidState(
                    "The song is still loading.".to_string(),
                ))
            }
            PlaybackStatus::Paused(_) | PlaybackStatus::Idle => {
                return Err(SchedulerError::InvalidState(
                    "No song is currently playing to pause.".to_string(),
                ))
            }
        };

        let handle = self.connection.clone().ok_or(SchedulerError::NotInRoom)?;
        self.services.transport.pause(&handle).await?;

        let old = self.status.state();
        self.status = match std::mem::replace(&mut self.status, PlaybackStatus::Idle) {
            PlaybackStatus::Playing(mut active) => {
                active.pause();
                PlaybackStatus::Paused(active)
            }
            other => other,
        };
        self.announce_state_change(old);
        info!("[{}] Playback paused", self.room_id);
        Ok(track)
    }

    async fn resume(&mut self) -> Result<TrackRequest, SchedulerError> {
        let track = match &self.status {
            PlaybackStatus::Paused(active) => active.track.clone(),
            _ => {
                return Err(SchedulerError::InvalidState(
                    "No song is currently paused.".to_string(),
                ))
            }
        };

        let handle = self.connection.clone().ok_or(SchedulerError::NotInRoom)?;
        self.services.transport.resume(&handle).await?;

        let old = self.status.state();
        self.status = match std::mem::replace(&mut self.status, PlaybackStatus::Idle) {
            PlaybackStatus::Paused(mut active) => {
                active.resume();
                PlaybackStatus::Playing(active)
            }
            other => other,
        };
        self.announce_state_change(old);
        info!("[{}] Playback resumed", self.room_id);
        Ok(track)
    }

    fn now_playing(&self) -> Result<NowPlaying, SchedulerError> {
        match &self.status {
            PlaybackStatus::Idle => Err(SchedulerError::NothingPlaying),
            PlaybackStatus::Loading { track, .. } => Ok(NowPlaying {
                track: track.clone(),
                state: PlaybackState::Playing,
                elapsed_secs: 0,
                duration_secs: track.duration_secs,
            }),
            PlaybackStatus::Playing(active) | PlaybackStatus::Paused(active) => Ok(NowPlaying {
                track: active.track.clone(),
                state: self.status.state(),
                elapsed_secs: active.elapsed().as_secs(),
                duration_secs: active.track.duration_secs,
            }),
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            channel: self.channel.clone(),
            state: self.status.state(),
            current: self.status.current().cloned(),
            queue_len: self.queue.len(),
            idle_timer_armed: self.idle_timer.is_armed(),
            idle_generation: self.idle_timer.generation(),
        }
    }

    // ------------------------------------------------------------------
    // Playback progression
    // ------------------------------------------------------------------

    /// Begin loading `track`; the stream is resolved off the room task
    fn start_track(&mut self, track: TrackRequest, from_queue: bool) {
        self.idle_timer.cancel();
        self.play_token += 1;
        let play_token = self.play_token;

        let source = track.source.clone();
        self.set_status(PlaybackStatus::Loading { track, from_queue });

        let resolver = self.services.resolver.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = resolver.resolve(&source).await.map(|resolved| resolved.stream);
            let _ = tx.send(Intent::StreamResolved { play_token, result });
        });
    }

    /// Start the next queued track, or go idle when the queue is empty
    ///
    /// Every failed attempt consumes the track it tried, so a queue full of
    /// unplayable entries drains in a single pass.
    fn start_next(&mut self, after_error: bool) {
        match self.queue.pop_front() {
            Some(track) => {
                info!("[{}] Playing next: {}", self.room_id, track.title);
                self.start_track(track, true);
            }
            None => self.finish_queue(after_error),
        }
    }

    fn finish_queue(&mut self, after_error: bool) {
        self.set_status(PlaybackStatus::Idle);
        if self.failure_streak > 0 {
            warn!(
                "[{}] Queue drained after {} unplayable track(s)",
                self.room_id, self.failure_streak
            );
        }
        self.failure_streak = 0;

        info!("[{}] Queue finished, scheduling auto-disconnect", self.room_id);
        self.emit(RoomEvent::QueueFinished {
            room_id: self.room_id.0,
            after_error,
            timestamp: chrono::Utc::now(),
        });
        self.arm_idle_timer();
    }

    async fn on_stream_resolved(&mut self, play_token: u64, result: Result<StreamRef, ResolveError>) {
        if play_token != self.play_token {
            debug!("[{}] Dropping stale stream resolution", self.room_id);
            return;
        }
        let (track, from_queue) = match &self.status {
            PlaybackStatus::Loading { track, from_queue } => (track.clone(), *from_queue),
            _ => return,
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                self.fail_track(track, e.to_string());
                return;
            }
        };
        let handle = match self.connection.clone() {
            Some(handle) => handle,
            None => {
                self.fail_track(track, TransportError::NotConnected.to_string());
                return;
            }
        };

        let tx = self.tx.clone();
        let on_finished: OnFinished = Box::new(move |error| {
            let _ = tx.send(Intent::PlaybackFinished { play_token, error });
        });

        match self.services.transport.play(&handle, stream, on_finished).await {
            Ok(()) => {
                info!("[{}] Playing: {}", self.room_id, track.title);
                self.failure_streak = 0;
                self.emit(RoomEvent::TrackStarted {
                    room_id: self.room_id.0,
                    entry_id: track.entry_id,
                    title: track.title.clone(),
                    requester: track.requester.display_name.clone(),
                    from_queue,
                    timestamp: chrono::Utc::now(),
                });
                self.set_status(PlaybackStatus::Playing(ActiveTrack::new(track)));
            }
            Err(e) => self.fail_track(track, e.to_string()),
        }
    }

    /// Report an unplayable track and move on
    fn fail_track(&mut self, track: TrackRequest, reason: String) {
        warn!("[{}] Error playing {}: {}", self.room_id, track.title, reason);
        self.failure_streak += 1;
        self.emit(RoomEvent::TrackFailed {
            room_id: self.room_id.0,
            entry_id: track.entry_id,
            title: track.title,
            reason,
            timestamp: chrono::Utc::now(),
        });
        self.start_next(true);
    }

    fn on_playback_finished(&mut self, play_token: u64, error: Option<TransportError>) {
        if play_token != self.play_token {
            debug!("[{}] Ignoring stale finished callback", self.room_id);
            return;
        }
        let track = match &self.status {
            PlaybackStatus::Playing(active) | PlaybackStatus::Paused(active) => active.track.clone(),
            _ => return,
        };

        let after_error = error.is_some();
        match error {
            Some(e) => {
                error!("[{}] Player error on {}: {}", self.room_id, track.title, e);
                self.emit(RoomEvent::PlaybackError {
                    room_id: self.room_id.0,
                    title: track.title,
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
            }
            None => debug!("[{}] Finished: {}", self.room_id, track.title),
        }

        self.start_next(after_error);
    }

    // ------------------------------------------------------------------
    // Idle timer and teardown
    // ------------------------------------------------------------------

    fn arm_idle_timer(&mut self) {
        let tx = self.tx.clone();
        self.idle_timer.arm(self.services.idle_timeout, move |generation| {
            let _ = tx.send(Intent::IdleTimerFired { generation });
        });
        debug!("[{}] Auto-disconnect task scheduled", self.room_id);
    }

    async fn on_idle_timer(&mut self, generation: u64) -> Flow {
        if !self.idle_timer.take_fire(generation) {
            debug!("[{}] Ignoring stale idle timer (generation {})", self.room_id, generation);
            return Flow::Continue;
        }

        // "Still idle" is checked now, not when the timer was armed
        if !matches!(self.status, PlaybackStatus::Idle) || !self.queue.is_empty() {
            info!("[{}] Auto-disconnect aborted: activity detected", self.room_id);
            return Flow::Continue;
        }
        if let Some(handle) = &self.connection {
            if self.services.transport.is_playing(handle).await {
                info!("[{}] Auto-disconnect aborted: transport still streaming", self.room_id);
                return Flow::Continue;
            }
        }

        info!("[{}] Auto-disconnected due to inactivity", self.room_id);
        self.emit(RoomEvent::IdleDisconnected {
            room_id: self.room_id.0,
            idle_secs: self.services.idle_timeout.as_secs(),
            timestamp: chrono::Utc::now(),
        });
        self.teardown().await;
        Flow::Exit
    }

    /// Release everything the room holds and unregister it
    ///
    /// The room is unregistered first; a successor created meanwhile starts
    /// only after the connection below has been released.
    async fn teardown(&mut self) -> LeaveOutcome {
        let guard = self.services.registry.begin_teardown(self.room_id, self.instance);
        self.idle_timer.cancel();
        // Invalidates pending resolutions and finished callbacks
        self.play_token += 1;

        let cleared = self.queue.clear();
        let stopped = !matches!(self.status, PlaybackStatus::Idle);
        self.set_status(PlaybackStatus::Idle);

        if let Some(handle) = self.connection.take() {
            if stopped {
                if let Err(e) = self.services.transport.stop(&handle).await {
                    warn!("[{}] Failed to stop playback on leave: {}", self.room_id, e);
                }
            }
            self.services.transport.disconnect(&handle).await;
        }
        self.channel = None;
        self.services
            .registry
            .end_teardown(self.room_id, self.instance, guard);

        info!("[{}] Left voice channel", self.room_id);
        self.emit(RoomEvent::RoomClosed {
            room_id: self.room_id.0,
            timestamp: chrono::Utc::now(),
        });
        LeaveOutcome { cleared, stopped }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_status(&mut self, status: PlaybackStatus) {
        let old = self.status.state();
        self.status = status;
        self.announce_state_change(old);
    }

    fn announce_state_change(&self, old: PlaybackState) {
        let new = self.status.state();
        if old != new {
            self.emit(RoomEvent::PlaybackStateChanged {
                room_id: self.room_id.0,
                old_state: old,
                new_state: new,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn emit(&self, event: RoomEvent) {
        self.services.state.broadcast_event(event);
    }
}
