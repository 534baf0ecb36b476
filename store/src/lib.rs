//! Storage contract for the Dyad governance engine.
//!
//! Every backend (LMDB, in-memory for testing) implements [`GovernanceStore`].
//! The engine depends only on this trait. Records are opaque bytes here; the
//! governance crate owns their encoding.
//!
//! All mutations go through [`GovernanceStore::commit`], which applies a
//! [`WriteBatch`] atomically and only if every guard in it still holds. This
//! single primitive gives the engine insert-if-absent, compare-and-swap status
//! transitions and conditional counter decrements.

pub mod batch;
pub mod error;
pub mod table;

pub use batch::{CommitOutcome, Guard, WriteBatch, WriteOp};
pub use error::StoreError;
pub use table::Table;

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Longest key any backend must accept (LMDB's default limit).
pub const MAX_KEY_LEN: usize = 511;

/// Key-value storage with guarded atomic commits.
pub trait GovernanceStore: Send + Sync {
    /// Read one record.
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// All records whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Apply `batch` atomically.
    ///
    /// Every guard is checked against the current state first; if any fails,
    /// nothing is written and [`CommitOutcome::GuardFailed`] is returned.
    fn commit(&self, batch: &WriteBatch) -> Result<CommitOutcome, StoreError>;

    /// Allocate the next value of a named monotonic sequence (first value is 1).
    fn next_sequence(&self, name: &str) -> Result<u64, StoreError>;
}

/// Reject a key no backend is required to store.
pub fn check_key(table: Table, key: &[u8]) -> Result<(), StoreError> {
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::KeyTooLarge {
            table,
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

/// Exclusive upper bound for a prefix scan, or `None` if the prefix is all `0xff`.
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}
