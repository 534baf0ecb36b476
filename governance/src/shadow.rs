//! Shadow consensus: how far private (Shadow) opinion sits from public
//! (True Self) opinion on a poll.
//!
//! Only mode-level aggregates enter a snapshot. Nothing here, or in what it
//! persists, can pair a True Self ballot with a Shadow ballot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use dyad_store::{Table, WriteBatch};
use dyad_types::{PollId, Timestamp};

use crate::codec::{self, keys};
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::poll::PollStatus;
use crate::spans;
use crate::tally::Tally;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowConsensus {
    pub poll_id: PollId,
    /// Yes share of decisive True Self weight, in basis points.
    pub true_self_yes_bps: Option<u32>,
    pub shadow_yes_bps: Option<u32>,
    /// `shadow - true_self`, in basis points; `None` unless both sides voted.
    pub gap_bps: Option<i32>,
    pub computed_at: Timestamp,
}

impl ShadowConsensus {
    pub fn from_tally(poll_id: PollId, tally: &Tally, computed_at: Timestamp) -> Self {
        let true_self_yes_bps = tally.true_self.yes_share_bps();
        let shadow_yes_bps = tally.shadow.yes_share_bps();
        let gap_bps = match (true_self_yes_bps, shadow_yes_bps) {
            (Some(t), Some(s)) => Some(s as i32 - t as i32),
            _ => None,
        };
        Self {
            poll_id,
            true_self_yes_bps,
            shadow_yes_bps,
            gap_bps,
            computed_at,
        }
    }

    /// Gap in whole percentage points, rounded toward zero.
    pub fn gap_points(&self) -> Option<i32> {
        self.gap_bps.map(|g| g / 100)
    }
}

impl GovernanceEngine {
    /// Current shadow consensus of a poll.
    ///
    /// Once a poll has resolved, the snapshot taken at resolution is final
    /// and is returned as stored. Before that, a fresh snapshot is computed
    /// from the committed ballots and persisted.
    pub fn get_shadow_consensus(&self, poll_id: PollId) -> Result<ShadowConsensus, GovernanceError> {
        let _span = spans::tally_span(poll_id).entered();
        let key = keys::poll(poll_id);
        let snapshot = self.retry_commit("shadow snapshot", || {
            let current = self.load_poll(poll_id)?;
            let finalized = matches!(current.value.status, PollStatus::Resolved | PollStatus::RolledBack);
            if finalized {
                if let Some(stored) = codec::load::<ShadowConsensus>(self.store.as_ref(), Table::Snapshots, &key)? {
                    return Ok(Some(stored.value));
                }
            }

            let tally = match (&current.value.final_tally, finalized) {
                (Some(t), true) => *t,
                _ => Tally::from_ballots(&self.load_ballots(poll_id)?),
            };
            let snapshot = ShadowConsensus::from_tally(poll_id, &tally, self.now());

            let mut batch = WriteBatch::new();
            if finalized {
                batch.expect_absent(Table::Snapshots, &key);
            } else {
                // A resolution in between owns the snapshot row from then on.
                batch.expect_value(Table::Polls, &key, &current.raw);
            }
            batch.put(Table::Snapshots, &key, &codec::encode(&snapshot)?);
            Ok(self.store.commit(&batch)?.is_committed().then_some(snapshot))
        })?;
        debug!(poll = %poll_id, gap_bps = ?snapshot.gap_bps, "shadow consensus computed");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::ModeTally;

    #[test]
    fn gap_is_shadow_minus_true_self() {
        let tally = Tally {
            true_self: ModeTally { yes_bps: 58, no_bps: 42, ..Default::default() },
            shadow: ModeTally { yes_bps: 76, no_bps: 24, ..Default::default() },
            participants: 2,
        };
        let s = ShadowConsensus::from_tally(PollId::new(1), &tally, Timestamp::EPOCH);
        assert_eq!(s.true_self_yes_bps, Some(5_800));
        assert_eq!(s.shadow_yes_bps, Some(7_600));
        assert_eq!(s.gap_bps, Some(1_800));
        assert_eq!(s.gap_points(), Some(18));
    }

    #[test]
    fn abstentions_do_not_move_the_share() {
        let tally = Tally {
            true_self: ModeTally { yes_bps: 1, no_bps: 1, abstain_bps: 10, ballots: 3 },
            ..Default::default()
        };
        let s = ShadowConsensus::from_tally(PollId::new(1), &tally, Timestamp::EPOCH);
        assert_eq!(s.true_self_yes_bps, Some(5_000));
        assert_eq!(s.shadow_yes_bps, None);
        assert_eq!(s.gap_bps, None);
    }
}
