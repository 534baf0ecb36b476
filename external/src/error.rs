use thiserror::Error;

use dyad_types::TokenAmount;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("call timed out after {0} ms")]
    Timeout(u64),

    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        needed: TokenAmount,
        available: TokenAmount,
    },

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ExternalError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
