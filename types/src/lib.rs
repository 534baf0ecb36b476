//! Fundamental types for the Dyad governance engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, the two identity modes, timestamps, token amounts, parameter values,
//! quorum configuration and the governance-tunable parameters.

pub mod amount;
pub mod id;
pub mod identity;
pub mod params;
pub mod quorum;
pub mod time;
pub mod user;
pub mod value;

pub use amount::TokenAmount;
pub use id::{DelegationId, PollId, RollbackId, StakeId, VoteId};
pub use identity::IdentityMode;
pub use params::{GovernanceParams, BASIS_POINTS, WEIGHT_UNIT};
pub use quorum::{QuorumConfig, QuorumModel};
pub use time::Timestamp;
pub use user::{UserId, UserIdError};
pub use value::{ParamType, ParamValue};
