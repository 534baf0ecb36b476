//! The Dyad governance decision engine.
//!
//! Every participant holds two identities, a True Self and a Shadow, and each
//! may cast one weighted ballot per poll. The engine covers the full decision
//! path:
//!
//! - constitutional guard and parameter whitelist at poll creation,
//! - deterministic per-(poll, voter, mode) section multipliers,
//! - ballots with jittered display times and a bounded number of changes,
//! - single-hop delegation,
//! - tally, quorum and outcome, with enactment into the whitelist,
//! - shadow consensus (True Self vs. Shadow divergence),
//! - conviction staking on outcomes,
//! - tiered emergency rollback,
//! - sweeps that close, resolve, settle and expire idempotently.
//!
//! All state lives behind [`dyad_store::GovernanceStore`]; every mutation is a
//! guarded commit, so several engine instances may share one store.

pub mod archive;
pub mod ballot;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod genesis;
pub mod inspector;
pub mod ledger;
pub mod poll;
pub mod registry;
pub mod rollback;
pub mod section;
pub mod shadow;
pub mod spans;
pub mod staking;
pub mod sweeps;
pub mod tally;
pub mod whitelist;

mod codec;

pub use archive::{voter_ref, ArchiveHandle, ArchiveMirror, ArchivePolicy, VoterRefKey};
pub use ballot::{BallotRequest, BallotView, Choice};
pub use config::EngineConfig;
pub use delegation::Delegation;
pub use engine::{Collaborators, GovernanceEngine, MAX_COMMIT_ATTEMPTS};
pub use error::{ErrorKind, GovernanceError};
pub use genesis::{seed_genesis, SeedReport};
pub use inspector::PollInspector;
pub use poll::{CreatePoll, Enactment, Outcome, ParameterChange, Poll, PollKind, PollStatus};
pub use registry::MAX_DESCRIPTION_LEN;
pub use rollback::{DetectionEvent, FounderAuthority, RollbackAction, RollbackRequest, RollbackStatus, RollbackTier};
pub use section::{draw_section, SectionDraw, SECTION_COUNT};
pub use shadow::ShadowConsensus;
pub use staking::{Settlement, StakePosition, StakeRequest, StakeStatus};
pub use sweeps::SweepReport;
pub use tally::{decide_outcome, majority_reached, quorum_met, ModeTally, Tally};
pub use whitelist::{default_whitelist, WhitelistEntry};
