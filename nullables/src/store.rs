//! Nullable store — thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use dyad_store::{check_key, CommitOutcome, GovernanceStore, StoreError, Table, WriteBatch, WriteOp};

type Tables = HashMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>;

/// An in-memory [`GovernanceStore`].
///
/// One mutex guards every table, so guarded commits are atomic exactly as
/// they are inside an LMDB write transaction.
#[derive(Debug, Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    sequences: Mutex<HashMap<String, u64>>,
    commits: Mutex<CommitStats>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    pub committed: u64,
    pub guard_failures: u64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a table.
    pub fn len(&self, table: Table) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }

    /// Committed batches and guard failures seen so far.
    pub fn commit_stats(&self) -> CommitStats {
        *self.commits.lock().unwrap()
    }

    /// Every key and value across all tables, for leak checks in tests.
    pub fn dump(&self) -> Vec<(Table, Vec<u8>, Vec<u8>)> {
        let tables = self.tables.lock().unwrap();
        let mut out = Vec::new();
        for (table, rows) in tables.iter() {
            for (k, v) in rows {
                out.push((*table, k.clone(), v.clone()));
            }
        }
        out
    }
}

impl GovernanceStore for NullStore {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(table, key)?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&table)
            .and_then(|t| t.get(key).cloned()))
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: &WriteBatch) -> Result<CommitOutcome, StoreError> {
        batch.check_keys()?;
        let mut tables = self.tables.lock().unwrap();

        for guard in batch.guards() {
            let current = tables
                .get(&guard.table)
                .and_then(|t| t.get(&guard.key))
                .map(|v| v.as_slice());
            if !guard.holds(current) {
                self.commits.lock().unwrap().guard_failures += 1;
                return Ok(CommitOutcome::GuardFailed {
                    table: guard.table,
                    key: guard.key.clone(),
                });
            }
        }

        for op in batch.ops() {
            match op {
                WriteOp::Put { table, key, value } => {
                    tables.entry(*table).or_default().insert(key.clone(), value.clone());
                }
                WriteOp::Delete { table, key } => {
                    if let Some(rows) = tables.get_mut(table) {
                        rows.remove(key);
                    }
                }
            }
        }
        self.commits.lock().unwrap().committed += 1;
        Ok(CommitOutcome::Committed)
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        let mut seqs = self.sequences.lock().unwrap();
        let next = seqs.entry(name.to_string()).or_insert(0);
        *next += 1;
        Ok(*next)
    }
}
