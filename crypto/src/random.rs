//! Operating-system entropy.

use dyad_external::{EntropySource, ExternalError};

/// Entropy source backed by the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), ExternalError> {
        getrandom::getrandom(buf).map_err(|e| ExternalError::Unavailable(format!("os entropy: {e}")))
    }
}
