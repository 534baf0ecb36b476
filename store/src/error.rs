use thiserror::Error;

use crate::table::Table;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Keys are bounded by the most restrictive backend.
    #[error("{table} key of {len} bytes exceeds the {max}-byte limit")]
    KeyTooLarge { table: Table, len: usize, max: usize },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}
