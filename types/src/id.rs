//! Record identifiers.
//!
//! Identifiers are allocated from monotonic store sequences, so they are plain
//! integers. Keys are encoded big-endian so that prefix scans return records in
//! allocation order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a ballot row.
pub type VoteId = u64;

/// Identifier of a delegation edge.
pub type DelegationId = u64;

/// Identifier of a conviction stake position.
pub type StakeId = u64;

/// Identifier of a rollback action.
pub type RollbackId = u64;

/// Identifier of a poll.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PollId(u64);

impl PollId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Big-endian storage key.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a storage key produced by [`PollId::to_key`].
    pub fn from_key(key: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = key.get(..8)?.try_into().ok()?;
        Some(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Debug for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PollId({})", self.0)
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

impl From<u64> for PollId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
