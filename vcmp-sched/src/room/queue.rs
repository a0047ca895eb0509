//! FIFO queue of pending tracks for one room
//!
//! Insertion order is play order. Positions exposed to users are 1-based.
//! The currently playing track is never in the queue; it is popped before
//! it starts.

use super::TrackRequest;
use crate::error::SchedulerError;
use std::collections::VecDeque;

/// Pending tracks of one room
#[derive(Debug, Default)]
pub struct Queue {
    entries: VecDeque<TrackRequest>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track; returns the new length, which is the track's position
    pub fn enqueue(&mut self, track: TrackRequest) -> usize {
        self.entries.push_back(track);
        self.entries.len()
    }

    /// Take the next track to play
    pub fn pop_front(&mut self) -> Option<TrackRequest> {
        self.entries.pop_front()
    }

    /// Remove the track at 1-based `position`
    pub fn remove_at(&mut self, position: usize) -> Result<TrackRequest, SchedulerError> {
        let len = self.entries.len();
        if position == 0 || position > len {
            return Err(SchedulerError::IndexOutOfRange {
                index: position,
                len,
            });
        }
        self.entries
            .remove(position - 1)
            .ok_or(SchedulerError::IndexOutOfRange {
                index: position,
                len,
            })
    }

    /// Drop every entry; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Non-mutating view of up to `n` entries in play order
    pub fn peek_first_n(&self, n: usize) -> impl Iterator<Item = &TrackRequest> + '_ {
        self.entries.iter().take(n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
