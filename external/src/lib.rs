//! Contracts for the services the governance engine calls but does not own.
//!
//! Identity issuance, token bookkeeping, the permanent archive, wall-clock
//! time and randomness all live behind these traits. Production code wires
//! real implementations; tests wire the deterministic doubles in
//! `dyad-nullables`.

pub mod archive;
pub mod error;

pub use archive::{ArchiveKind, ArchiveRecord};
pub use error::ExternalError;

use dyad_types::{IdentityMode, Timestamp, TokenAmount, UserId};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Identity and humanity verification.
pub trait IdentityService: Send + Sync {
    /// Whether `user` is a verified human allowed to act as `mode`.
    fn is_verified_human(&self, user: &UserId, mode: IdentityMode) -> Result<bool, ExternalError>;

    /// Number of currently verified humans.
    fn verified_user_count(&self) -> Result<u64, ExternalError>;

    /// Reputation score of the user's True Self.
    fn reputation(&self, user: &UserId) -> Result<u64, ExternalError>;
}

/// Token balances, escrow and burns.
///
/// Every call carries a `reference` naming the engine record it belongs to.
/// Implementations must treat a repeated call with the same reference as a
/// no-op so the engine can retry safely.
pub trait TokenEconomy: Send + Sync {
    /// Move `amount` from the user's balance into escrow.
    fn escrow(&self, user: &UserId, amount: TokenAmount, reference: &str) -> Result<(), ExternalError>;

    /// Pay `amount` out of escrow to the user.
    fn release(&self, user: &UserId, amount: TokenAmount, reference: &str) -> Result<(), ExternalError>;

    /// Destroy `amount` held in escrow (protocol fees, settlement dust).
    fn burn(&self, amount: TokenAmount, reference: &str) -> Result<(), ExternalError>;
}

/// Permanent, append-only archive of polls and ballots.
pub trait ArchiveSink: Send + Sync {
    fn archive(&self, record: &ArchiveRecord) -> Result<(), ExternalError>;
}

/// Randomness for privacy jitter.
pub trait EntropySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<(), ExternalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now().as_secs() > 1_577_836_800);
    }
}
