//! Timestamp type used throughout the engine.
//!
//! Timestamps are Unix epoch seconds (UTC). Engine code never reads the system
//! clock directly; it asks the injected `Clock` collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub const HOUR: u64 = 3600;
    pub const DAY: u64 = 24 * Self::HOUR;

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current system time. A clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub fn minus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Shift by a signed offset, saturating at both ends.
    pub fn offset_by(&self, delta_secs: i64) -> Self {
        if delta_secs >= 0 {
            self.plus_secs(delta_secs.unsigned_abs())
        } else {
            self.minus_secs(delta_secs.unsigned_abs())
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
