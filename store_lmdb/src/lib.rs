//! LMDB storage backend for the Dyad governance engine.
//!
//! Implements [`dyad_store::GovernanceStore`] using the `heed` LMDB bindings.
//! Each [`dyad_store::Table`] maps to one named database within a single
//! environment; guarded batches are checked and applied inside one write
//! transaction, which LMDB serializes across threads.

pub mod environment;
pub mod error;
pub mod integrity;
mod store;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
