//! Governance parameters: every tunable the decision engine reads.
//!
//! Weights and shares are fixed-point integers in basis points so that tallies
//! are exact and deterministic.

use crate::quorum::QuorumConfig;
use crate::time::Timestamp;
use crate::user::UserId;
use serde::{Deserialize, Serialize};

/// 100 % expressed in basis points.
pub const BASIS_POINTS: u32 = 10_000;

/// Base voting weight of one identity (1.0), in basis points.
pub const WEIGHT_UNIT: u64 = BASIS_POINTS as u64;

/// All parameters the engine consults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceParams {
    // ── Sections ────────────────────────────────────────────────────────
    /// Lower bound of the section multiplier range (7000 = 0.7).
    pub multiplier_min_bps: u32,

    /// Upper bound of the section multiplier range (15000 = 1.5).
    pub multiplier_max_bps: u32,

    // ── Ballots ─────────────────────────────────────────────────────────
    /// Maximum number of changes after the first ballot.
    pub max_vote_changes: u32,

    /// Maximum absolute offset between true and displayed cast time.
    pub vote_jitter_max_secs: u64,

    /// Maximum reasoning length (bytes).
    pub max_reasoning_len: usize,

    // ── Polls ───────────────────────────────────────────────────────────
    pub parameter_vote_duration_secs: u64,
    pub general_duration_secs: u64,
    pub emergency_duration_secs: u64,

    /// Quorum for general polls and parameter polls without their own config.
    pub general_quorum: QuorumConfig,

    /// Quorum for emergency polls.
    pub emergency_quorum: QuorumConfig,

    /// Supermajority required by emergency polls (6667 ≈ two thirds).
    pub emergency_supermajority_bps: Option<u32>,

    /// Minimum reputation a True Self needs to create a poll.
    pub min_proposer_reputation: u64,

    pub max_title_len: usize,

    // ── Rollback ────────────────────────────────────────────────────────
    /// Window after resolution in which any rollback tier may act.
    pub rollback_window_secs: u64,

    /// The founder identity, if founder-tier rollback is enabled.
    pub founder: Option<UserId>,

    /// Initial, non-replenishing founder token allowance.
    pub founder_token_allowance: u32,

    /// Founder authority hard-expires this long after the allowance is seeded.
    pub founder_transition_secs: u64,

    /// Verified signatures needed for a petition rollback.
    pub petition_signature_threshold: u32,

    /// Detectors whose events may trigger automatic rollback.
    pub trusted_detectors: Vec<String>,

    // ── Staking ─────────────────────────────────────────────────────────
    /// Protocol fee taken from the losing pool (200 = 2 %).
    pub stake_fee_bps: u32,

    /// Smallest accepted stake (raw units).
    pub min_stake: u64,
}

impl GovernanceParams {
    /// Production configuration.
    pub fn defaults() -> Self {
        Self {
            multiplier_min_bps: 7_000,
            multiplier_max_bps: 15_000,

            max_vote_changes: 5,
            vote_jitter_max_secs: 3 * Timestamp::HOUR,
            max_reasoning_len: 2_000,

            parameter_vote_duration_secs: 7 * Timestamp::DAY,
            general_duration_secs: 7 * Timestamp::DAY,
            emergency_duration_secs: Timestamp::DAY,
            general_quorum: QuorumConfig::either(1_000, 1_000), // 1000 weight or 10 %
            emergency_quorum: QuorumConfig::percentage(2_000), // 20 %
            emergency_supermajority_bps: Some(6_667),
            min_proposer_reputation: 10,
            max_title_len: 200,

            rollback_window_secs: 72 * Timestamp::HOUR,
            founder: None,
            founder_token_allowance: 5,
            founder_transition_secs: 3 * 365 * Timestamp::DAY,
            petition_signature_threshold: 100,
            trusted_detectors: vec!["constitutional-monitor".to_string()],

            stake_fee_bps: 200,
            min_stake: 1,
        }
    }

    /// Small community / local testing: short polls, low thresholds.
    pub fn testnet_defaults() -> Self {
        Self {
            parameter_vote_duration_secs: Timestamp::HOUR,
            general_duration_secs: Timestamp::HOUR,
            emergency_duration_secs: 15 * 60,
            general_quorum: QuorumConfig::either(3, 1_000),
            emergency_quorum: QuorumConfig::percentage(1_000),
            min_proposer_reputation: 0,
            petition_signature_threshold: 3,
            ..Self::defaults()
        }
    }

    /// Largest accepted display jitter.
    pub const MAX_VOTE_JITTER_SECS: u64 = 7 * Timestamp::DAY;

    /// Basic sanity checks on the configured values.
    pub fn validate(&self) -> Result<(), String> {
        if self.multiplier_min_bps == 0 || self.multiplier_min_bps > self.multiplier_max_bps {
            return Err(format!(
                "multiplier range {}..={} bps is empty",
                self.multiplier_min_bps, self.multiplier_max_bps
            ));
        }
        if self.vote_jitter_max_secs > Self::MAX_VOTE_JITTER_SECS {
            return Err(format!(
                "vote_jitter_max_secs {} exceeds {}",
                self.vote_jitter_max_secs,
                Self::MAX_VOTE_JITTER_SECS
            ));
        }
        if self.stake_fee_bps > BASIS_POINTS {
            return Err(format!("stake_fee_bps {} exceeds 100%", self.stake_fee_bps));
        }
        if let Some(bps) = self.emergency_supermajority_bps {
            if bps <= BASIS_POINTS / 2 || bps > BASIS_POINTS {
                return Err(format!("emergency supermajority {bps} bps out of range"));
            }
        }
        if !self.general_quorum.is_well_formed() || !self.emergency_quorum.is_well_formed() {
            return Err("quorum configuration has no reachable threshold".into());
        }
        Ok(())
    }
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self::defaults()
    }
}
