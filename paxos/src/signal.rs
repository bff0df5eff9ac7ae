//! A single-use, condition-variable-backed notification with a self-retrying wait.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::util::defaults::SIGNAL_RETRY_INTERVAL;

struct SignalState {
    flag: bool,
    success: bool,
}

/// A single-use edge with a boolean value. `wait` blocks until `set` is called, invoking a
/// retry thunk on every timeout in between — this is how `Parliament::add_legislator` /
/// `remove_legislator` eventually make progress even if their initial broadcast is lost: the
/// retry thunk re-kicks the proposer pipeline (typically by sending an empty proposal).
pub struct Signal {
    state: Mutex<SignalState>,
    condition: Condvar,
    retry: Box<dyn Fn() + Send + Sync>,
    retry_interval: Duration,
}

impl Signal {
    pub fn new(retry: impl Fn() + Send + Sync + 'static) -> Self {
        Self::with_interval(retry, SIGNAL_RETRY_INTERVAL)
    }

    pub fn with_interval(retry: impl Fn() + Send + Sync + 'static, retry_interval: Duration) -> Self {
        Self {
            state: Mutex::new(SignalState {
                flag: false,
                success: false,
            }),
            condition: Condvar::new(),
            retry: Box::new(retry),
            retry_interval,
        }
    }

    /// Sets the signal's value and wakes any waiter. Idempotent: a second `set` simply
    /// overwrites the pending value until it is consumed by `wait`.
    pub fn set(&self, success: bool) {
        let mut state = self.state.lock().expect("signal mutex poisoned");
        state.flag = true;
        state.success = success;
        self.condition.notify_one();
    }

    /// Blocks until `set` is called, invoking the retry thunk on every `retry_interval` timeout
    /// in which no value has arrived yet.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().expect("signal mutex poisoned");
        loop {
            let (guard, timeout_result) = self
                .condition
                .wait_timeout(state, self.retry_interval)
                .expect("signal mutex poisoned");
            state = guard;
            if state.flag {
                state.flag = false;
                return state.success;
            }
            if timeout_result.timed_out() {
                drop(state);
                (self.retry)();
                state = self.state.lock().expect("signal mutex poisoned");
            }
        }
    }
}
