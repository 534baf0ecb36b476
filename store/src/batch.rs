//! Guarded write batches.
//!
//! ```ignore
//! let mut batch = WriteBatch::new();
//! batch.expect_value(Table::Polls, &key, &current_bytes);
//! batch.put(Table::Polls, &key, &next_bytes);
//! match store.commit(&batch)? {
//!     CommitOutcome::Committed => { /* we won the transition */ }
//!     CommitOutcome::GuardFailed { .. } => { /* someone else changed it first */ }
//! }
//! ```

use crate::error::StoreError;
use crate::table::Table;
use crate::check_key;

/// Precondition on one key: its current value must equal `expected`
/// (`None` meaning the key must be absent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Guard {
    pub table: Table,
    pub key: Vec<u8>,
    pub expected: Option<Vec<u8>>,
}

impl Guard {
    /// Whether `current` satisfies this guard.
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        self.expected.as_deref() == current
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: Vec<u8>,
    },
}

/// Result of a guarded commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The first guard that did not hold; nothing was written.
    GuardFailed { table: Table, key: Vec<u8> },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

/// Guards plus writes, applied all-or-nothing by a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    guards: Vec<Guard>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to currently hold `expected` (`None` = absent).
    pub fn expect(&mut self, table: Table, key: &[u8], expected: Option<&[u8]>) -> &mut Self {
        self.guards.push(Guard {
            table,
            key: key.to_vec(),
            expected: expected.map(|v| v.to_vec()),
        });
        self
    }

    pub fn expect_absent(&mut self, table: Table, key: &[u8]) -> &mut Self {
        self.expect(table, key, None)
    }

    pub fn expect_value(&mut self, table: Table, key: &[u8], value: &[u8]) -> &mut Self {
        self.expect(table, key, Some(value))
    }

    pub fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> &mut Self {
        self.ops.push(WriteOp::Put {
            table,
            key: key.to_vec(),
            value: value.to_vec(),
        });
        self
    }

    pub fn delete(&mut self, table: Table, key: &[u8]) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            table,
            key: key.to_vec(),
        });
        self
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Check every guarded and written key against [`crate::MAX_KEY_LEN`].
    pub fn check_keys(&self) -> Result<(), StoreError> {
        for guard in &self.guards {
            check_key(guard.table, &guard.key)?;
        }
        for op in &self.ops {
            match op {
                WriteOp::Put { table, key, .. } | WriteOp::Delete { table, key } => check_key(*table, key)?,
            }
        }
        Ok(())
    }

    /// Append another batch's guards and writes after this batch's.
    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.guards.extend(other.guards);
        self.ops.extend(other.ops);
        self
    }
}
