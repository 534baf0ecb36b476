use thiserror::Error;

use dyad_consti::{ConstiError, Violation};
use dyad_external::ExternalError;
use dyad_store::StoreError;
use dyad_types::{DelegationId, IdentityMode, PollId, TokenAmount, UserIdError};

use crate::poll::PollStatus;

/// Coarse classification every caller can branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    ConstitutionalViolation,
    NotFound,
    Unauthorized,
    State,
    Conflict,
    InsufficientFunds,
    /// A collaborator could not be reached; retrying later may succeed.
    Unavailable,
    /// Storage or encoding fault.
    Internal,
}

#[derive(Debug, Error)]
pub enum GovernanceError {
    // ── Validation ──────────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("parameter '{0}' is not on the whitelist")]
    ParameterNotWhitelisted(String),

    #[error("invalid value for '{parameter}': {reason}")]
    InvalidParameterValue { parameter: String, reason: String },

    #[error("request rejected by collaborator: {0}")]
    Rejected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid constitutional reference: {0}")]
    Constitution(#[from] ConstiError),

    // ── Constitutional ──────────────────────────────────────────────────
    #[error("constitutional violation: {}", describe_violations(.0))]
    ConstitutionalViolation(Vec<Violation>),

    // ── Not found ───────────────────────────────────────────────────────
    #[error("{0} not found")]
    PollNotFound(PollId),

    #[error("no ballot on {0} for this identity")]
    BallotNotFound(PollId),

    #[error("delegation {0} not found")]
    DelegationNotFound(DelegationId),

    // ── Unauthorized ────────────────────────────────────────────────────
    #[error("identity is not a verified human in {0} mode")]
    NotVerified(IdentityMode),

    #[error("reputation {have} is below the required {need}")]
    InsufficientReputation { have: u64, need: u64 },

    #[error("only the poll creator may do this")]
    NotCreator,

    #[error("only the delegator may revoke a delegation")]
    NotDelegator,

    #[error("caller is not the founder")]
    NotFounder,

    #[error("a ballot is visible only to its own voter")]
    NotBallotOwner,

    #[error("detector '{0}' is not trusted")]
    UntrustedDetector(String),

    // ── State ───────────────────────────────────────────────────────────
    #[error("poll is {0}, not open")]
    PollNotOpen(PollStatus),

    #[error("voting period has ended")]
    VotingClosed,

    #[error("voting period has not ended yet")]
    VotingStillOpen,

    #[error("poll already has ballots and can no longer be withdrawn")]
    PollHasBallots,

    #[error("ballot change limit of {max} reached")]
    ChangeLimitExceeded { max: u32 },

    #[error("rollback window has expired")]
    RollbackWindowExpired,

    #[error("poll has already been rolled back")]
    AlreadyRolledBack,

    #[error("poll is {status} with no enacted decision to roll back")]
    NothingToRollBack { status: PollStatus },

    #[error("rollback for this poll is no longer pending")]
    RollbackNotPending,

    #[error("founder rollback tokens are exhausted")]
    FounderTokensExhausted,

    #[error("founder rollback authority has expired")]
    FounderAuthorityExpired,

    #[error("delegation {0} is already revoked")]
    DelegationAlreadyRevoked(DelegationId),

    // ── Conflict ────────────────────────────────────────────────────────
    #[error("this identity has already voted on {0}")]
    AlreadyVoted(PollId),

    #[error("cannot delegate to self")]
    SelfDelegation,

    #[error("delegation conflict: {0}")]
    DelegationConflict(String),

    #[error("a delegate's ballot already carries this identity on {0}")]
    DelegatedVoteCarried(PollId),

    #[error("petition already signed by this user")]
    DuplicateSignature,

    #[error("'{parameter}' has changed since enactment; cannot revert")]
    RevertConflict { parameter: String },

    #[error("too much contention on {0}; retry")]
    Contended(&'static str),

    // ── Funds ───────────────────────────────────────────────────────────
    #[error("insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        needed: TokenAmount,
        available: TokenAmount,
    },

    // ── Collaborators / internal ────────────────────────────────────────
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("encoding error: {0}")]
    Codec(String),
}

fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("article {} ({}): {}", v.article_number, v.title, v.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        use GovernanceError::*;
        match self {
            InvalidInput(_)
            | InvalidUserId(_)
            | ParameterNotWhitelisted(_)
            | InvalidParameterValue { .. }
            | Rejected(_)
            | Config(_)
            | Constitution(_) => ErrorKind::Validation,

            ConstitutionalViolation(_) => ErrorKind::ConstitutionalViolation,

            PollNotFound(_) | BallotNotFound(_) | DelegationNotFound(_) => ErrorKind::NotFound,

            NotVerified(_)
            | InsufficientReputation { .. }
            | NotCreator
            | NotDelegator
            | NotFounder
            | NotBallotOwner
            | UntrustedDetector(_) => ErrorKind::Unauthorized,

            PollNotOpen(_)
            | VotingClosed
            | VotingStillOpen
            | PollHasBallots
            | ChangeLimitExceeded { .. }
            | RollbackWindowExpired
            | AlreadyRolledBack
            | NothingToRollBack { .. }
            | RollbackNotPending
            | FounderTokensExhausted
            | FounderAuthorityExpired
            | DelegationAlreadyRevoked(_) => ErrorKind::State,

            AlreadyVoted(_)
            | SelfDelegation
            | DelegationConflict(_)
            | DelegatedVoteCarried(_)
            | DuplicateSignature
            | RevertConflict { .. }
            | Contended(_) => ErrorKind::Conflict,

            InsufficientFunds { .. } => ErrorKind::InsufficientFunds,

            Unavailable(_) => ErrorKind::Unavailable,

            Store(_) | Codec(_) => ErrorKind::Internal,
        }
    }

    /// Articles cited by a constitutional rejection (empty otherwise).
    pub fn violated_articles(&self) -> Vec<u32> {
        match self {
            GovernanceError::ConstitutionalViolation(v) => v.iter().map(|v| v.article_number).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<ExternalError> for GovernanceError {
    fn from(e: ExternalError) -> Self {
        match e {
            ExternalError::InsufficientFunds { needed, available } => {
                GovernanceError::InsufficientFunds { needed, available }
            }
            ExternalError::Rejected(msg) => GovernanceError::Rejected(msg),
            ExternalError::Unavailable(msg) => GovernanceError::Unavailable(msg),
            ExternalError::Timeout(ms) => GovernanceError::Unavailable(format!("timed out after {ms} ms")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_map_onto_taxonomy() {
        let funds: GovernanceError = ExternalError::InsufficientFunds {
            needed: TokenAmount::new(10),
            available: TokenAmount::new(3),
        }
        .into();
        assert_eq!(funds.kind(), ErrorKind::InsufficientFunds);

        let timeout: GovernanceError = ExternalError::Timeout(500).into();
        assert_eq!(timeout.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn violation_message_names_articles() {
        let err = GovernanceError::ConstitutionalViolation(vec![Violation {
            article_number: 1,
            title: "Dual Identity".into(),
            reason: "enable_shadow_voting must not be set to false".into(),
        }]);
        assert_eq!(err.kind(), ErrorKind::ConstitutionalViolation);
        assert_eq!(err.violated_articles(), vec![1]);
        assert!(err.to_string().contains("article 1 (Dual Identity)"));
    }
}
