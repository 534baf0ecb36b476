//! Nullable clock — deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use dyad_external::Clock;
use dyad_types::Timestamp;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Shareable across threads.
#[derive(Debug)]
pub struct NullClock {
    current: AtomicU64,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u64) {
        self.current.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_only_when_told() {
        let clock = NullClock::new(1_000);
        assert_eq!(clock.now().as_secs(), 1_000);
        clock.advance(3_600);
        assert_eq!(clock.now().as_secs(), 4_600);
        clock.set(5);
        assert_eq!(clock.now().as_secs(), 5);
    }
}
