//! The proposer's retry-pacing strategy: run immediately, or after a randomised backoff.

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::util::defaults::PROPOSER_PAUSE_BOUND;

/// A pluggable delay strategy invoked by the proposer before retrying after a nack, to break
/// symmetric collisions between competing proposers.
pub trait Pause: Send + Sync {
    fn start(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Runs the callback immediately on the calling thread.
#[derive(Default)]
pub struct NoPause;

impl Pause for NoPause {
    fn start(&self, callback: Box<dyn FnOnce() + Send>) {
        callback();
    }
}

/// Runs the callback on a background thread after a uniform random delay in `[0, max]`.
pub struct RandomPause {
    max: Duration,
}

impl RandomPause {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

impl Default for RandomPause {
    fn default() -> Self {
        Self::new(PROPOSER_PAUSE_BOUND)
    }
}

impl Pause for RandomPause {
    fn start(&self, callback: Box<dyn FnOnce() + Send>) {
        let delay = if self.max.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_nanos(rand::thread_rng().gen_range(0..=self.max.as_nanos() as u64))
        };
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            callback();
        });
    }
}
