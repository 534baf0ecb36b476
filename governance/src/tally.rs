//! Tally and quorum evaluation.
//!
//! A tally is a pure function of the committed ballots: no randomness, no
//! clock, no locks. It may be recomputed any number of times.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use dyad_types::{IdentityMode, QuorumConfig, QuorumModel, UserId, BASIS_POINTS, WEIGHT_UNIT};

use crate::ballot::{Ballot, Choice};
use crate::poll::Outcome;

/// Weighted totals for one identity mode, in basis points of one vote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTally {
    pub yes_bps: u64,
    pub no_bps: u64,
    pub abstain_bps: u64,
    pub ballots: u64,
}

impl ModeTally {
    pub fn total_bps(&self) -> u64 {
        self.yes_bps + self.no_bps + self.abstain_bps
    }

    pub fn decisive_bps(&self) -> u64 {
        self.yes_bps + self.no_bps
    }

    /// Yes share of decisive weight, in basis points; `None` without decisive votes.
    pub fn yes_share_bps(&self) -> Option<u32> {
        let decisive = self.decisive_bps() as u128;
        if decisive == 0 {
            return None;
        }
        Some((self.yes_bps as u128 * BASIS_POINTS as u128 / decisive) as u32)
    }

    fn add(&mut self, choice: Choice, weight: u64) {
        match choice {
            Choice::Yes => self.yes_bps += weight,
            Choice::No => self.no_bps += weight,
            Choice::Abstain => self.abstain_bps += weight,
        }
        self.ballots += 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub true_self: ModeTally,
    pub shadow: ModeTally,
    /// Distinct humans represented: direct voters in either mode plus carried
    /// delegators, each counted once.
    pub participants: u64,
}

impl Tally {
    pub fn from_ballots<'a>(ballots: impl IntoIterator<Item = &'a Ballot>) -> Self {
        let mut tally = Tally::default();
        let mut humans: HashSet<&UserId> = HashSet::new();
        for ballot in ballots {
            let slot = match ballot.mode {
                IdentityMode::TrueSelf => &mut tally.true_self,
                IdentityMode::Shadow => &mut tally.shadow,
            };
            slot.add(ballot.choice, ballot.effective_weight_bps);
            humans.insert(&ballot.voter);
            humans.extend(ballot.carried.iter());
        }
        tally.participants = humans.len() as u64;
        tally
    }

    pub fn mode(&self, mode: IdentityMode) -> &ModeTally {
        match mode {
            IdentityMode::TrueSelf => &self.true_self,
            IdentityMode::Shadow => &self.shadow,
        }
    }

    pub fn yes_bps(&self) -> u64 {
        self.true_self.yes_bps + self.shadow.yes_bps
    }

    pub fn no_bps(&self) -> u64 {
        self.true_self.no_bps + self.shadow.no_bps
    }

    pub fn total_weight_bps(&self) -> u64 {
        self.true_self.total_bps() + self.shadow.total_bps()
    }
}

/// Whether `tally` satisfies `quorum`. Abstentions count toward quorum.
///
/// Monotonic: adding ballots can only turn `false` into `true`.
pub fn quorum_met(quorum: &QuorumConfig, tally: &Tally, eligible_voters: u64) -> bool {
    let absolute = || tally.total_weight_bps() >= quorum.absolute_min.saturating_mul(WEIGHT_UNIT);
    let percentage = || {
        tally.participants > 0
            && tally.participants as u128 * BASIS_POINTS as u128
                >= quorum.percentage_bps as u128 * eligible_voters as u128
    };
    match quorum.model {
        QuorumModel::Absolute => absolute(),
        QuorumModel::Percentage => percentage(),
        QuorumModel::Either => absolute() || percentage(),
    }
}

/// Whether decisive weight passes: simple majority (ties fail) or the given
/// supermajority of decisive weight.
pub fn majority_reached(tally: &Tally, supermajority_bps: Option<u32>) -> bool {
    let yes = tally.yes_bps() as u128;
    let no = tally.no_bps() as u128;
    match supermajority_bps {
        None => yes > no,
        Some(bps) => yes + no > 0 && yes * BASIS_POINTS as u128 >= bps as u128 * (yes + no),
    }
}

/// Final outcome. `quorum_latched` carries a quorum observed earlier.
pub fn decide_outcome(
    tally: &Tally,
    quorum: &QuorumConfig,
    supermajority_bps: Option<u32>,
    eligible_voters: u64,
    quorum_latched: bool,
) -> Outcome {
    if !quorum_latched && !quorum_met(quorum, tally, eligible_voters) {
        return Outcome::NoQuorum;
    }
    if majority_reached(tally, supermajority_bps) {
        Outcome::Passed
    } else {
        Outcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyad_types::{PollId, Timestamp};

    fn ballot(voter: &str, mode: IdentityMode, choice: Choice, weight: u64, carried: &[&str]) -> Ballot {
        Ballot {
            id: 0,
            poll_id: PollId::new(1),
            voter: UserId::new(voter),
            mode,
            section: 0,
            multiplier_bps: 10_000,
            choice,
            effective_weight_bps: weight,
            carried: carried.iter().map(|c| UserId::new(*c)).collect(),
            cast_at: Timestamp::EPOCH,
            displayed_at: Timestamp::EPOCH,
            change_count: 0,
            reasoning: None,
        }
    }

    #[test]
    fn participants_count_humans_once_across_modes() {
        let ballots = vec![
            ballot("a", IdentityMode::TrueSelf, Choice::Yes, 10_000, &["c"]),
            ballot("a", IdentityMode::Shadow, Choice::No, 10_000, &[]),
            ballot("b", IdentityMode::Shadow, Choice::Abstain, 10_000, &["c"]),
        ];
        let tally = Tally::from_ballots(&ballots);
        assert_eq!(tally.participants, 3);
        assert_eq!(tally.true_self.yes_bps, 10_000);
        assert_eq!(tally.shadow.total_bps(), 20_000);
    }

    #[test]
    fn absolute_quorum_is_strict_about_the_minimum() {
        let quorum = QuorumConfig::absolute(1_000);
        let short = Tally {
            true_self: ModeTally { yes_bps: 999 * WEIGHT_UNIT, ..Default::default() },
            ..Default::default()
        };
        assert!(!quorum_met(&quorum, &short, 0));
        let exact = Tally {
            true_self: ModeTally { yes_bps: 1_000 * WEIGHT_UNIT, ..Default::default() },
            ..Default::default()
        };
        assert!(quorum_met(&quorum, &exact, 0));
    }

    #[test]
    fn percentage_quorum_uses_eligible_snapshot() {
        let quorum = QuorumConfig::percentage(2_500);
        let tally = Tally { participants: 25, ..Default::default() };
        assert!(quorum_met(&quorum, &tally, 100));
        assert!(!quorum_met(&quorum, &tally, 101));
        assert!(!quorum_met(&quorum, &Tally::default(), 0));
    }

    #[test]
    fn either_model_accepts_whichever_threshold() {
        let quorum = QuorumConfig::either(1_000, 5_000);
        let by_people = Tally { participants: 5, ..Default::default() };
        assert!(quorum_met(&quorum, &by_people, 10));
    }

    #[test]
    fn ties_fail_and_supermajority_is_inclusive() {
        let tie = Tally {
            true_self: ModeTally { yes_bps: 5, no_bps: 5, ..Default::default() },
            ..Default::default()
        };
        assert!(!majority_reached(&tie, None));

        let two_thirds = Tally {
            true_self: ModeTally { yes_bps: 6_667, no_bps: 3_333, ..Default::default() },
            ..Default::default()
        };
        assert!(majority_reached(&two_thirds, Some(6_667)));
        assert!(!majority_reached(&two_thirds, Some(6_668)));
    }

    #[test]
    fn latched_quorum_survives_lower_weight() {
        let quorum = QuorumConfig::absolute(10);
        let tally = Tally {
            true_self: ModeTally { yes_bps: WEIGHT_UNIT, ..Default::default() },
            ..Default::default()
        };
        assert_eq!(decide_outcome(&tally, &quorum, None, 0, false), Outcome::NoQuorum);
        assert_eq!(decide_outcome(&tally, &quorum, None, 0, true), Outcome::Passed);
    }
}
