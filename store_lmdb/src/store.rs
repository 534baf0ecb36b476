//! LMDB implementation of GovernanceStore.

use dyad_store::{check_key, CommitOutcome, GovernanceStore, StoreError, Table, WriteBatch, WriteOp};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

fn sequence_key(name: &str) -> Vec<u8> {
    let mut key = b"seq:".to_vec();
    key.extend_from_slice(name.as_bytes());
    key
}

impl GovernanceStore for LmdbEnvironment {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(table, key)?;
        let db = self.db(table)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let value = db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let db = self.db(table)?;
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        if prefix.is_empty() {
            for item in db.iter(&rtxn).map_err(LmdbError::from)? {
                let (k, v) = item.map_err(LmdbError::from)?;
                out.push((k.to_vec(), v.to_vec()));
            }
        } else {
            for item in db.prefix_iter(&rtxn, prefix).map_err(LmdbError::from)? {
                let (k, v) = item.map_err(LmdbError::from)?;
                out.push((k.to_vec(), v.to_vec()));
            }
        }
        Ok(out)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<CommitOutcome, StoreError> {
        batch.check_keys()?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        for guard in batch.guards() {
            let db = self.db(guard.table)?;
            let current = db.get(&wtxn, &guard.key).map_err(LmdbError::from)?;
            if !guard.holds(current) {
                tracing::debug!(table = %guard.table, "guard failed, batch discarded");
                // Dropping the transaction aborts it.
                return Ok(CommitOutcome::GuardFailed {
                    table: guard.table,
                    key: guard.key.clone(),
                });
            }
        }

        for op in batch.ops() {
            match op {
                WriteOp::Put { table, key, value } => {
                    self.db(*table)?
                        .put(&mut wtxn, key, value)
                        .map_err(LmdbError::from)?;
                }
                WriteOp::Delete { table, key } => {
                    self.db(*table)?
                        .delete(&mut wtxn, key)
                        .map_err(LmdbError::from)?;
                }
            }
        }

        wtxn.commit().map_err(LmdbError::from)?;
        Ok(CommitOutcome::Committed)
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StoreError> {
        let db = self.db(Table::Meta)?;
        let key = sequence_key(name);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let current = match db.get(&wtxn, &key).map_err(LmdbError::from)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption(format!("sequence '{name}' has unexpected byte length"))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let next = current + 1;
        db.put(&mut wtxn, &key, &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(next)
    }
}
