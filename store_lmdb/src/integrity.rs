//! LMDB database integrity checks.
//!
//! Run before serving requests to detect corruption early.

use std::path::Path;

use heed::types::Bytes;

use dyad_store::Table;

use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub entries_per_table: Vec<(&'static str, u64)>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Open every table's database and count its entries.
///
/// Read failures and missing tables are recorded in the report rather than
/// causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;

    for table in Table::ALL {
        let name = table.name();
        match env.env().open_database::<Bytes, Bytes>(&rtxn, Some(name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => {
                        report.total_entries += count;
                        report.entries_per_table.push((name, count));
                    }
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", name, e)),
                }
            }
            Ok(None) => report.errors.push(format!("database '{}' is missing", name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", name, e)),
        }
    }

    match env.schema_version() {
        Ok(v) if v == dyad_store::SCHEMA_VERSION => {}
        Ok(v) => report.errors.push(format!("unexpected schema version {v}")),
        Err(e) => report.errors.push(format!("unreadable schema version: {e}")),
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("never-created")).is_ok());
    }

    #[test]
    fn existing_dir_without_data_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn fresh_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 << 20).unwrap();
        let report = check_integrity(&env).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked as usize, Table::ALL.len());
        // Only the schema version row exists.
        assert_eq!(report.total_entries, 1);
    }
}
