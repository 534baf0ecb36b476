//! Polls and their lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use dyad_types::{ParamValue, PollId, QuorumConfig, Timestamp, UserId};

use crate::tally::Tally;

/// A proposed change to a whitelisted parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub parameter: String,
    pub value: ParamValue,
}

impl ParameterChange {
    pub fn new(parameter: impl Into<String>, value: ParamValue) -> Self {
        Self {
            parameter: parameter.into(),
            value,
        }
    }
}

/// What a poll decides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// Changes one whitelisted parameter; configured by its whitelist entry.
    ParameterVote(ParameterChange),
    /// A non-binding or off-platform decision; nothing is enacted.
    General,
    /// Fast-tracked: short window, early close once quorum latches.
    Emergency(Option<ParameterChange>),
}

impl PollKind {
    pub fn name(&self) -> &'static str {
        match self {
            PollKind::ParameterVote(_) => "parameter_vote",
            PollKind::General => "general",
            PollKind::Emergency(_) => "emergency",
        }
    }

    pub fn change(&self) -> Option<&ParameterChange> {
        match self {
            PollKind::ParameterVote(change) => Some(change),
            PollKind::Emergency(change) => change.as_ref(),
            PollKind::General => None,
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, PollKind::Emergency(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Open,
    Closed,
    Resolved,
    RolledBack,
    Withdrawn,
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollStatus::RolledBack | PollStatus::Withdrawn)
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PollStatus::Open => "open",
            PollStatus::Closed => "closed",
            PollStatus::Resolved => "resolved",
            PollStatus::RolledBack => "rolled_back",
            PollStatus::Withdrawn => "withdrawn",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    NoQuorum,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
            Outcome::NoQuorum => "NO_QUORUM",
        })
    }
}

/// A parameter change applied when the poll passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enactment {
    pub parameter: String,
    pub previous: ParamValue,
    pub applied: ParamValue,
    pub enacted_at: Timestamp,
}

/// A poll record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub kind: PollKind,
    pub title: String,
    pub description: String,
    pub creator: UserId,
    pub category: String,
    pub status: PollStatus,
    pub quorum: QuorumConfig,
    /// `None` means simple majority.
    pub supermajority_bps: Option<u32>,
    pub opens_at: Timestamp,
    pub closes_at: Timestamp,
    /// Verified users when the poll opened; the base for percentage quorum.
    pub eligible_voters: u64,
    /// Set by the first ballot; withdrawal requires it to be false.
    pub has_ballots: bool,
    /// First time quorum was observed. Never cleared.
    pub quorum_reached_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    pub outcome: Option<Outcome>,
    pub final_tally: Option<Tally>,
    pub enactment: Option<Enactment>,
    /// End of the rollback window, fixed when the poll resolves.
    pub rollback_window_expires_at: Option<Timestamp>,
    pub stakes_settled: bool,
    pub rolled_back_at: Option<Timestamp>,
}

impl Poll {
    /// Open and inside its voting window.
    pub fn accepts_ballots(&self, now: Timestamp) -> bool {
        self.status == PollStatus::Open && now < self.closes_at
    }
}

/// Input to `create_poll`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoll {
    pub kind: PollKind,
    pub title: String,
    pub description: String,
    pub creator: UserId,
}
