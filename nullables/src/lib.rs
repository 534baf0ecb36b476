//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the governance engine consumes (clock, storage,
//! identity, token economy, archive, entropy) sits behind a trait. This crate
//! provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, verify users, inject failures)
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod archive;
pub mod clock;
pub mod entropy;
pub mod identity;
pub mod store;
pub mod tokens;

pub use archive::NullArchive;
pub use clock::NullClock;
pub use entropy::NullEntropy;
pub use identity::NullIdentity;
pub use store::NullStore;
pub use tokens::{NullTokens, TokenCall};
