//! Hashing and entropy primitives for the Dyad governance engine.
//!
//! - **Blake2b-256** for domain-separated derivations (section draws)
//! - **keyed Blake2b-256** for archive voter references
//! - **OS entropy** for vote-time jitter

pub mod hash;
pub mod random;

pub use hash::{blake2b_256, blake2b_256_keyed, blake2b_256_multi, hash_slice_u64, KEY_LEN};
pub use random::OsEntropy;
