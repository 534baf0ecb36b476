//! LMDB environment setup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use dyad_store::{Table, SCHEMA_VERSION};

use crate::LmdbError;

pub(crate) const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Wraps the LMDB environment and one database handle per table.
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    pub(crate) dbs: HashMap<Table, Database<Bytes, Bytes>>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at `path`, creating every table.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path; the
        // engine never opens the same directory twice concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(Table::ALL.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let mut dbs = HashMap::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some(table.name()))?;
            dbs.insert(table, db);
        }

        let meta = dbs[&Table::Meta];
        let existing = meta.get(&wtxn, SCHEMA_VERSION_KEY)?.map(|b| b.to_vec());
        match existing {
            None => {
                meta.put(&mut wtxn, SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_le_bytes())?;
            }
            Some(bytes) => {
                let found = read_schema_version(&bytes)?;
                if found != SCHEMA_VERSION {
                    return Err(LmdbError::Serialization(format!(
                        "schema version {found} does not match expected {SCHEMA_VERSION}"
                    )));
                }
            }
        }
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env,
            dbs,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub(crate) fn db(&self, table: Table) -> Result<Database<Bytes, Bytes>, LmdbError> {
        self.dbs
            .get(&table)
            .copied()
            .ok_or_else(|| LmdbError::Heed(format!("database '{}' not opened", table.name())))
    }

    /// Stored schema version (0 if never written).
    pub fn schema_version(&self) -> Result<u32, LmdbError> {
        let rtxn = self.env.read_txn()?;
        match self.db(Table::Meta)?.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => read_schema_version(bytes),
            None => Ok(0),
        }
    }
}

fn read_schema_version(bytes: &[u8]) -> Result<u32, LmdbError> {
    let arr: [u8; 4] = bytes.try_into().map_err(|_| {
        LmdbError::Serialization("schema_version has unexpected byte length".to_string())
    })?;
    Ok(u32::from_le_bytes(arr))
}
