//! Deterministic media resolver
//!
//! A query `name` resolves to title `name`, canonical url `fake://name` and
//! stream url `stream://name`. Resolving the canonical url again (what the
//! scheduler does right before playing) can be made to fail or to block.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use vcmp_sched::resolver::{ResolveError, ResolvedTrack, TrackResolver};
use vcmp_sched::transport::StreamRef;

pub const TRACK_SECS: u64 = 120;

#[derive(Default)]
struct Inner {
    lookups: Vec<String>,
    fail_lookup: HashSet<String>,
    fail_stream: HashSet<String>,
    held: HashMap<String, Arc<Notify>>,
}

#[derive(Default)]
pub struct FakeResolver {
    inner: Mutex<Inner>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the initial lookup of `name` fail
    pub fn fail_lookup(&self, name: &str) {
        self.inner.lock().unwrap().fail_lookup.insert(name.to_string());
    }

    /// Make stream resolution of `name` fail at play time
    pub fn fail_stream(&self, name: &str) {
        self.inner.lock().unwrap().fail_stream.insert(name.to_string());
    }

    /// Block stream resolution of `name` until [`FakeResolver::release`]
    pub fn hold(&self, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .held
            .insert(name.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, name: &str) {
        if let Some(gate) = self.inner.lock().unwrap().held.remove(name) {
            gate.notify_one();
        }
    }

    /// Every query passed to `resolve`, in order
    pub fn lookups(&self) -> Vec<String> {
        self.inner.lock().unwrap().lookups.clone()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
        let (name, is_stream) = match query.strip_prefix("fake://") {
            Some(name) => (name.to_string(), true),
            None => (query.to_string(), false),
        };

        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.lookups.push(query.to_string());
            if !is_stream && inner.fail_lookup.contains(&name) {
                return Err(ResolveError::NotFound(name));
            }
            if is_stream && inner.fail_stream.contains(&name) {
                return Err(ResolveError::Unavailable(format!("{} is gone", name)));
            }
            if is_stream {
                inner.held.get(&name).cloned()
            } else {
                None
            }
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(ResolvedTrack {
            title: name.clone(),
            canonical_url: format!("fake://{}", name),
            duration_secs: TRACK_SECS,
            stream: StreamRef {
                url: format!("stream://{}", name),
                duration_secs: TRACK_SECS,
            },
        })
    }
}
