//! Quorum configuration attached to every poll.

use serde::{Deserialize, Serialize};

/// How a poll decides whether participation was sufficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumModel {
    /// Total effective weight must reach a fixed minimum.
    Absolute,
    /// Distinct participants must reach a share of verified users.
    Percentage,
    /// Either of the two thresholds suffices.
    Either,
}

/// Quorum thresholds for one poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuorumConfig {
    pub model: QuorumModel,
    /// Minimum total effective weight, in whole weight units (1.0 = one unit).
    pub absolute_min: u64,
    /// Minimum share of verified users, in basis points.
    pub percentage_bps: u32,
}

impl QuorumConfig {
    pub fn absolute(min: u64) -> Self {
        Self {
            model: QuorumModel::Absolute,
            absolute_min: min,
            percentage_bps: 0,
        }
    }

    pub fn percentage(bps: u32) -> Self {
        Self {
            model: QuorumModel::Percentage,
            absolute_min: 0,
            percentage_bps: bps,
        }
    }

    pub fn either(min: u64, bps: u32) -> Self {
        Self {
            model: QuorumModel::Either,
            absolute_min: min,
            percentage_bps: bps,
        }
    }

    /// Reject nonsensical thresholds (a share above 100 %, a model with no threshold).
    pub fn is_well_formed(&self) -> bool {
        if self.percentage_bps > 10_000 {
            return false;
        }
        match self.model {
            QuorumModel::Absolute => self.absolute_min > 0,
            QuorumModel::Percentage => self.percentage_bps > 0,
            QuorumModel::Either => self.absolute_min > 0 && self.percentage_bps > 0,
        }
    }
}
