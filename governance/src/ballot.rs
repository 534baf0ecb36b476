//! Ballot records.

use serde::{Deserialize, Serialize};
use std::fmt;

use dyad_types::{IdentityMode, PollId, Timestamp, UserId, VoteId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Yes,
    No,
    Abstain,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Choice::Yes => "yes",
            Choice::No => "no",
            Choice::Abstain => "abstain",
        })
    }
}

/// The live ballot of one identity on one poll.
///
/// `cast_at` is the true time of the latest version and stays inside the
/// crate; everything outside sees the jittered `displayed_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub id: VoteId,
    pub poll_id: PollId,
    pub voter: UserId,
    pub mode: IdentityMode,
    pub section: u8,
    pub multiplier_bps: u32,
    pub choice: Choice,
    /// multiplier × (1 + carried delegators), in basis points of one vote.
    pub effective_weight_bps: u64,
    /// Delegators whose base weight this ballot carries.
    pub carried: Vec<UserId>,
    pub(crate) cast_at: Timestamp,
    pub displayed_at: Timestamp,
    /// 0 for the first version.
    pub change_count: u32,
    pub reasoning: Option<String>,
}

impl Ballot {
    pub fn view(&self) -> BallotView {
        BallotView {
            poll_id: self.poll_id,
            mode: self.mode,
            section: self.section,
            multiplier_bps: self.multiplier_bps,
            choice: self.choice,
            effective_weight_bps: self.effective_weight_bps,
            carried_delegators: self.carried.len() as u32,
            displayed_at: self.displayed_at,
            change_count: self.change_count,
            reasoning: self.reasoning.clone(),
        }
    }
}

/// What the voter sees of their own ballot. Carries no identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotView {
    pub poll_id: PollId,
    pub mode: IdentityMode,
    pub section: u8,
    pub multiplier_bps: u32,
    pub choice: Choice,
    pub effective_weight_bps: u64,
    pub carried_delegators: u32,
    pub displayed_at: Timestamp,
    pub change_count: u32,
    pub reasoning: Option<String>,
}

/// Input to `cast_vote` and `change_vote`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotRequest {
    pub poll_id: PollId,
    pub voter: UserId,
    pub mode: IdentityMode,
    pub choice: Choice,
    pub reasoning: Option<String>,
}

impl BallotRequest {
    pub fn new(poll_id: PollId, voter: UserId, mode: IdentityMode, choice: Choice) -> Self {
        Self {
            poll_id,
            voter,
            mode,
            choice,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}
