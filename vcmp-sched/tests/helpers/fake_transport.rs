//! Recording voice transport with manually driven stream ends

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;
use vcmp_sched::room::RoomId;
use vcmp_sched::transport::{
    ChannelRef, ConnectionHandle, OnFinished, StreamRef, TransportError, VoiceTransport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect(u64),
    MoveTo(u64),
    Disconnect,
    Play(String),
    Stop,
    Pause,
    Resume,
}

#[derive(Default)]
struct Inner {
    calls: Vec<(RoomId, TransportCall)>,
    connected: HashSet<RoomId>,
    streams: HashMap<RoomId, OnFinished>,
    paused: HashSet<RoomId>,
    fail_connect: Option<TransportError>,
    fail_play: HashSet<String>,
    disconnect_delay: Option<Duration>,
}

/// Streams never end on their own; tests call [`FakeTransport::finish`]
#[derive(Default)]
pub struct FakeTransport {
    inner: Mutex<Inner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_connect(&self, error: TransportError) {
        self.inner.lock().unwrap().fail_connect = Some(error);
    }

    /// Make `disconnect` suspend for `delay` before releasing the session
    pub fn slow_disconnect(&self, delay: Duration) {
        self.inner.lock().unwrap().disconnect_delay = Some(delay);
    }

    /// Make `play` reject the given stream url
    pub fn fail_play(&self, url: &str) {
        self.inner.lock().unwrap().fail_play.insert(url.to_string());
    }

    /// End the room's active stream, as if it ran out or broke
    pub fn finish(&self, room_id: RoomId, error: Option<TransportError>) -> bool {
        let callback = {
            let mut inner = self.inner.lock().unwrap();
            inner.paused.remove(&room_id);
            inner.streams.remove(&room_id)
        };
        match callback {
            Some(on_finished) => {
                on_finished(error);
                true
            }
            None => false,
        }
    }

    pub fn calls(&self, room_id: RoomId) -> Vec<TransportCall> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(id, _)| *id == room_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Urls handed to `play`, in order
    pub fn plays(&self, room_id: RoomId) -> Vec<String> {
        self.calls(room_id)
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Play(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn is_connected(&self, room_id: RoomId) -> bool {
        self.inner.lock().unwrap().connected.contains(&room_id)
    }

    pub fn is_streaming(&self, room_id: RoomId) -> bool {
        self.inner.lock().unwrap().streams.contains_key(&room_id)
    }

    fn record(&self, room_id: RoomId, call: TransportCall) {
        self.inner.lock().unwrap().calls.push((room_id, call));
    }

    /// Remove the stream and fire its callback on another task
    fn cut(&self, room_id: RoomId) {
        let callback = {
            let mut inner = self.inner.lock().unwrap();
            inner.paused.remove(&room_id);
            inner.streams.remove(&room_id)
        };
        if let Some(on_finished) = callback {
            tokio::spawn(async move { on_finished(None) });
        }
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(
        &self,
        room_id: RoomId,
        channel: &ChannelRef,
    ) -> Result<ConnectionHandle, TransportError> {
        self.record(room_id, TransportCall::Connect(channel.id));
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_connect.take() {
            return Err(error);
        }
        if !inner.connected.insert(room_id) {
            return Err(TransportError::AlreadyConnected);
        }
        Ok(ConnectionHandle {
            room_id,
            session_id: Uuid::new_v4(),
        })
    }

    async fn move_to(
        &self,
        handle: &ConnectionHandle,
        channel: &ChannelRef,
    ) -> Result<(), TransportError> {
        self.record(handle.room_id, TransportCall::MoveTo(channel.id));
        Ok(())
    }

    async fn disconnect(&self, handle: &ConnectionHandle) {
        self.record(handle.room_id, TransportCall::Disconnect);
        self.cut(handle.room_id);
        let delay = self.inner.lock().unwrap().disconnect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.lock().unwrap().connected.remove(&handle.room_id);
    }

    async fn play(
        &self,
        handle: &ConnectionHandle,
        stream: StreamRef,
        on_finished: OnFinished,
    ) -> Result<(), TransportError> {
        self.record(handle.room_id, TransportCall::Play(stream.url.clone()));
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_play.contains(&stream.url) {
            return Err(TransportError::Stream(format!("cannot open {}", stream.url)));
        }
        if inner.streams.contains_key(&handle.room_id) {
            return Err(TransportError::AlreadyPlaying);
        }
        inner.streams.insert(handle.room_id, on_finished);
        Ok(())
    }

    async fn stop(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(handle.room_id, TransportCall::Stop);
        self.cut(handle.room_id);
        Ok(())
    }

    async fn pause(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(handle.room_id, TransportCall::Pause);
        self.inner.lock().unwrap().paused.insert(handle.room_id);
        Ok(())
    }

    async fn resume(&self, handle: &ConnectionHandle) -> Result<(), TransportError> {
        self.record(handle.room_id, TransportCall::Resume);
        self.inner.lock().unwrap().paused.remove(&handle.room_id);
        Ok(())
    }

    async fn is_playing(&self, handle: &ConnectionHandle) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.streams.contains_key(&handle.room_id) && !inner.paused.contains(&handle.room_id)
    }

    async fn is_paused(&self, handle: &ConnectionHandle) -> bool {
        self.inner.lock().unwrap().paused.contains(&handle.room_id)
    }
}
