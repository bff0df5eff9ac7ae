//! Small free-standing helpers shared across roles: timeout defaults and the logical clock used
//! to reset the acceptor's cleanup lease on the latest-arriving prepare (see `roles::acceptor`).

use std::time::Duration;

pub(crate) mod defaults {
    use std::time::Duration;

    /// `Signal::wait`'s retry interval.
    pub(crate) const SIGNAL_RETRY_INTERVAL: Duration = Duration::from_secs(1);
    /// The acceptor's cleanup lease window.
    pub(crate) const ACCEPTOR_LEASE_WINDOW: Duration = Duration::from_secs(1);
    /// `RandomPause`'s upper bound between nack and retry.
    pub(crate) const PROPOSER_PAUSE_BOUND: Duration = Duration::from_millis(100);
}

/// Ticks forward in fixed units and reports when a configured timeout has elapsed, resetting
/// itself afterwards. Used by the acceptor to implement "the latest-arriving prepare resets the
/// cleanup lease timer" (see `SPEC_FULL.md` §9 and `DESIGN.md`'s open-question resolution).
#[derive(Debug)]
pub(crate) struct LogicalClock {
    time: Duration,
    timeout: Duration,
}

impl LogicalClock {
    pub(crate) fn with(timeout: Duration) -> Self {
        Self {
            time: Duration::ZERO,
            timeout,
        }
    }

    /// Resets the clock to zero — called whenever a fresh prepare arrives.
    pub(crate) fn reset(&mut self) {
        self.time = Duration::ZERO;
    }

    /// Advances the clock by `elapsed` and reports whether the timeout has now been reached.
    /// Resets itself on timeout so that repeated calls without an intervening `reset` keep
    /// reporting `true` (useful when `handle_cleanup` is invoked on a fixed tick and needs to
    /// recognize "still expired" on every poll, not just the first).
    pub(crate) fn tick_and_check_timeout(&mut self, elapsed: Duration) -> bool {
        self.time += elapsed;
        if self.time >= self.timeout {
            self.time = Duration::ZERO;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_clock_fires_once_timeout_elapsed() {
        let mut clock = LogicalClock::with(Duration::from_millis(100));
        assert!(!clock.tick_and_check_timeout(Duration::from_millis(50)));
        assert!(clock.tick_and_check_timeout(Duration::from_millis(60)));
    }

    #[test]
    fn logical_clock_resets_on_prepare() {
        let mut clock = LogicalClock::with(Duration::from_millis(100));
        clock.tick_and_check_timeout(Duration::from_millis(80));
        clock.reset();
        assert!(!clock.tick_and_check_timeout(Duration::from_millis(50)));
    }
}
