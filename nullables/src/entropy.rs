//! Nullable entropy — fixed bytes instead of OS randomness.

use std::sync::Mutex;

use dyad_external::{EntropySource, ExternalError};

/// Fills every buffer from a fixed, repeating byte pattern.
#[derive(Debug)]
pub struct NullEntropy {
    pattern: Mutex<Vec<u8>>,
}

impl NullEntropy {
    pub fn new(pattern: Vec<u8>) -> Self {
        Self {
            pattern: Mutex::new(if pattern.is_empty() { vec![0] } else { pattern }),
        }
    }

    /// All zero bytes.
    pub fn zeros() -> Self {
        Self::new(vec![0])
    }

    /// Replace the pattern used for subsequent calls.
    pub fn set(&self, pattern: Vec<u8>) {
        if !pattern.is_empty() {
            *self.pattern.lock().unwrap() = pattern;
        }
    }
}

impl EntropySource for NullEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), ExternalError> {
        let pattern = self.pattern.lock().unwrap();
        for (i, b) in buf.iter_mut().enumerate() {
            *b = pattern[i % pattern.len()];
        }
        Ok(())
    }
}
