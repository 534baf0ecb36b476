//! Blake2b hashing.

use blake2::digest::consts::U32;
use blake2::digest::generic_array::GenericArray;
use blake2::digest::{KeyInit, Mac};
use blake2::{Blake2b, Blake2bMac, Digest};

type Blake2b256 = Blake2b<U32>;
type Blake2bMac256 = Blake2bMac<U32>;

/// Length of a full-size Blake2b key.
pub const KEY_LEN: usize = 64;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
///
/// Variable-length parts should be length-prefixed by the caller when they
/// are adjacent, otherwise `["ab", "c"]` and `["a", "bc"]` collide.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Read the `index`-th big-endian u64 out of a digest (0..=3).
///
/// Distinct indices give non-overlapping slices, so values drawn from
/// different slices of one digest are independent.
pub fn hash_slice_u64(digest: &[u8; 32], index: usize) -> u64 {
    let start = (index % 4) * 8;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[start..start + 8]);
    u64::from_be_bytes(bytes)
}

/// Keyed Blake2b-256 over parts in sequence.
///
/// Without the key the output cannot be recomputed from the parts.
pub fn blake2b_256_keyed(key: &[u8; KEY_LEN], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = <Blake2bMac256 as KeyInit>::new(GenericArray::from_slice(key));
    for part in parts {
        Mac::update(&mut mac, part);
    }
    let result = mac.finalize().into_bytes();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}
