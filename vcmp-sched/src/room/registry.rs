//! Room registry
//!
//! Maps room ids to the handle of the controller task that owns the room.
//! The registry only guards existence; room state itself lives inside the
//! controller and is reached by sending intents through the handle.
//!
//! A room leaves the map as soon as its teardown begins, so later intents
//! create a fresh instance. That successor waits for the predecessor's
//! teardown to finish before touching the transport.

use super::intent::{Intent, Reply};
use super::RoomId;
use crate::error::SchedulerError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Sending side of a room controller
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    instance: u64,
    tx: mpsc::UnboundedSender<Intent>,
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, instance: u64, tx: mpsc::UnboundedSender<Intent>) -> Self {
        Self {
            room_id,
            instance,
            tx,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Registry instance number; distinguishes a room from its successor
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether the controller behind this handle has shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Send an intent and wait for its reply
    ///
    /// A controller that has already torn the room down drops the intent;
    /// that surfaces as `NotInRoom`.
    pub(crate) async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Intent,
    ) -> Result<T, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .map_err(|_| SchedulerError::NotInRoom)?;
        reply_rx.await.map_err(|_| SchedulerError::NotInRoom)?
    }
}

/// Held by a controller while it tears its room down; dropping it releases
/// any successor waiting on the same room
pub(crate) type TeardownGuard = watch::Sender<()>;

/// Resolves once the predecessor instance has finished its teardown
pub(crate) struct PredecessorTeardown(watch::Receiver<()>);

impl PredecessorTeardown {
    pub(crate) async fn wait(mut self) {
        // Nothing is ever sent; the call returns when the guard is dropped
        let _ = self.0.changed().await;
    }
}

#[derive(Default)]
struct Rooms {
    live: HashMap<RoomId, RoomHandle>,
    /// Instances still releasing their connection
    closing: HashMap<RoomId, (u64, watch::Receiver<()>)>,
}

/// Existence map of live rooms
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<Rooms>,
    next_instance: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live room
    pub fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms()
            .live
            .get(&room_id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Return the live room, or create one with `spawn`
    ///
    /// `spawn` receives the new instance number and, when an earlier
    /// instance of the room is still tearing down, a way to wait for it. It
    /// must start the controller and runs under the registry lock, so it
    /// must not block.
    pub(crate) fn get_or_create<F>(&self, room_id: RoomId, spawn: F) -> RoomHandle
    where
        F: FnOnce(u64, Option<PredecessorTeardown>) -> RoomHandle,
    {
        let mut rooms = self.rooms();
        if let Some(handle) = rooms.live.get(&room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed) + 1;
        let predecessor = rooms
            .closing
            .get(&room_id)
            .map(|(_, rx)| PredecessorTeardown(rx.clone()));
        let handle = spawn(instance, predecessor);
        debug!("[{}] Registered room instance {}", room_id, instance);
        rooms.live.insert(room_id, handle.clone());
        handle
    }

    /// Remove `room_id` only if it is still the given instance
    pub fn remove_instance(&self, room_id: RoomId, instance: u64) -> bool {
        let mut rooms = self.rooms();
        match rooms.live.get(&room_id) {
            Some(handle) if handle.instance == instance => {
                rooms.live.remove(&room_id);
                debug!("[{}] Unregistered room instance {}", room_id, instance);
                true
            }
            _ => false,
        }
    }

    /// Unregister `instance` and record it as closing
    ///
    /// Successors created before the returned guard is passed to
    /// [`RoomRegistry::end_teardown`] wait for it.
    pub(crate) fn begin_teardown(&self, room_id: RoomId, instance: u64) -> TeardownGuard {
        let (tx, rx) = watch::channel(());
        let mut rooms = self.rooms();
        if matches!(rooms.live.get(&room_id), Some(h) if h.instance == instance) {
            rooms.live.remove(&room_id);
            debug!("[{}] Unregistered room instance {} for teardown", room_id, instance);
        }
        rooms.closing.insert(room_id, (instance, rx));
        tx
    }

    /// Forget the closing record of `instance` and release its successors
    pub(crate) fn end_teardown(&self, room_id: RoomId, instance: u64, guard: TeardownGuard) {
        let mut rooms = self.rooms();
        if matches!(rooms.closing.get(&room_id), Some((i, _)) if *i == instance) {
            rooms.closing.remove(&room_id);
        }
        drop(guard);
    }

    /// Ids of all live rooms
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self
            .rooms()
            .live
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.room_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
