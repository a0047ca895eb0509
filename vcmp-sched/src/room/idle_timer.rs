//! Idle/auto-leave timer
//!
//! At most one timer is live per room. Every `arm` or `cancel` advances the
//! generation; the fire callback receives the generation it was armed with
//! and the room only acts on it if [`IdleTimer::take_fire`] confirms the
//! generation is still current. A fire that was already in flight when the
//! timer was cancelled or re-armed is therefore dropped.

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::debug;

/// Cancellable delayed "leave if still idle" action
#[derive(Debug, Default)]
pub struct IdleTimer {
    generation: u64,
    /// Sleeping task of the live timer, None when disarmed
    task: Option<JoinHandle<()>>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, replacing any live one. Returns the new generation.
    ///
    /// `fire` runs on a separate task after `delay` and is given the
    /// generation token.
    pub fn arm<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire(generation);
        }));
        debug!("Idle timer armed (generation {}, {:?})", generation, delay);
        generation
    }

    /// Disarm the live timer, if any. Returns whether one was live.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a fire for `generation` if it belongs to the live timer.
    ///
    /// A successful take disarms the timer, so each armed instance is acted
    /// on at most once.
    pub fn take_fire(&mut self, generation: u64) -> bool {
        if self.task.is_some() && generation == self.generation {
            self.task = None;
            self.generation += 1;
            true
        } else {
            false
        }
    }

    /// Whether a timer is currently live
    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    /// Current generation token
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u64>>>, impl Fn() -> Box<dyn FnOnce(u64) + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let make = move || {
            let sink = sink.clone();
            Box::new(move |generation| sink.lock().unwrap().push(generation))
                as Box<dyn FnOnce(u64) + Send>
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (fired, make) = recorder();
        let mut timer = IdleTimer::new();

        let generation = timer.arm(Duration::from_secs(300), make());
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![generation]);
        assert!(timer.take_fire(generation));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous() {
        let (fired, make) = recorder();
        let mut timer = IdleTimer::new();

        let first = timer.arm(Duration::from_secs(10), make());
        let second = timer.arm(Duration::from_secs(10), make());
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_secs(20)).await;
        // Only the replacement fired
        assert_eq!(*fired.lock().unwrap(), vec![second]);
        assert!(!timer.take_fire(first));
        assert!(timer.take_fire(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (fired, make) = recorder();
        let mut timer = IdleTimer::new();

        timer.arm(Duration::from_secs(5), make());
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_fire_rejected_after_cancel() {
        let (fired, make) = recorder();
        let mut timer = IdleTimer::new();

        let generation = timer.arm(Duration::from_secs(1), make());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![generation]);

        // The fire was delivered, but the owner cancelled before handling it
        timer.cancel();
        assert!(!timer.take_fire(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_taken_once() {
        let (_fired, make) = recorder();
        let mut timer = IdleTimer::new();

        let generation = timer.arm(Duration::from_secs(1), make());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(timer.take_fire(generation));
        assert!(!timer.take_fire(generation));
    }
}
