//! Resolution and the background sweeps.
//!
//! Every step is a guarded status transition, so sweeps may run repeatedly
//! and from several schedulers at once: a loser of any race observes the new
//! status and skips.

use tracing::{info, warn};

use dyad_external::ArchiveKind;
use dyad_store::{Table, WriteBatch};
use dyad_types::PollId;

use crate::codec::{self, keys};
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::poll::{Enactment, Outcome, PollStatus};
use crate::shadow::ShadowConsensus;
use crate::spans;
use crate::tally::{decide_outcome, quorum_met, Tally};
use crate::whitelist;

/// What one sweep pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub closed: usize,
    pub resolved: usize,
    pub stakes_settled: usize,
    pub refunded: usize,
    pub petitions_expired: usize,
    /// Polls skipped because a step failed; they are retried next pass.
    pub errors: usize,
}

impl SweepReport {
    pub fn is_idle(&self) -> bool {
        *self == SweepReport::default()
    }
}

impl GovernanceEngine {
    /// Tally a closed poll and record its outcome.
    ///
    /// A passing parameter poll enacts its change into the whitelist in the
    /// same commit, recording the previous value for rollback. Returns
    /// `false` if the poll was not `Closed`.
    pub fn resolve_poll(&self, poll_id: PollId) -> Result<bool, GovernanceError> {
        let _span = spans::tally_span(poll_id).entered();
        let resolved = self.retry_commit("resolve poll", || {
            let current = self.load_poll(poll_id)?;
            if current.value.status != PollStatus::Closed {
                return Ok(Some(None));
            }
            let now = self.now();
            // Read before this commit enacts anything.
            let params = self.effective_params()?;
            let mut poll = current.value.clone();
            let tally = Tally::from_ballots(&self.load_ballots(poll_id)?);
            if poll.quorum_reached_at.is_none() && quorum_met(&poll.quorum, &tally, poll.eligible_voters) {
                poll.quorum_reached_at = Some(now);
            }
            let outcome = decide_outcome(
                &tally,
                &poll.quorum,
                poll.supermajority_bps,
                poll.eligible_voters,
                poll.quorum_reached_at.is_some(),
            );

            let mut batch = WriteBatch::new();
            if let (Outcome::Passed, Some(change)) = (outcome, poll.kind.change().cloned()) {
                let entry = whitelist::load_entry(self.store.as_ref(), &change.parameter)?
                    .ok_or_else(|| GovernanceError::ParameterNotWhitelisted(change.parameter.clone()))?;
                let mut enacted = entry.value.clone();
                enacted.current_value = change.value.clone();
                enacted.updated_at = now;
                batch
                    .expect_value(Table::Whitelist, change.parameter.as_bytes(), &entry.raw)
                    .put(Table::Whitelist, change.parameter.as_bytes(), &codec::encode(&enacted)?);
                poll.enactment = Some(Enactment {
                    parameter: change.parameter.clone(),
                    previous: entry.value.current_value,
                    applied: change.value.clone(),
                    enacted_at: now,
                });
            }

            poll.status = PollStatus::Resolved;
            poll.resolved_at = Some(now);
            poll.rollback_window_expires_at = Some(now.plus_secs(params.rollback_window_secs));
            poll.outcome = Some(outcome);
            poll.final_tally = Some(tally);

            let key = keys::poll(poll_id);
            let snapshot = ShadowConsensus::from_tally(poll_id, &tally, now);
            batch
                .expect_value(Table::Polls, &key, &current.raw)
                .put(Table::Polls, &key, &codec::encode(&poll)?)
                .put(Table::Snapshots, &key, &codec::encode(&snapshot)?);
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            Ok(Some(Some(poll)))
        })?;

        let Some(poll) = resolved else {
            return Ok(false);
        };
        info!(
            poll = %poll_id,
            outcome = %poll.outcome.unwrap_or(Outcome::NoQuorum),
            enacted = poll.enactment.is_some(),
            "poll resolved"
        );
        self.archive_poll(ArchiveKind::PollResolved, &poll);
        Ok(true)
    }

    /// Close, resolve, settle and expire whatever is due.
    pub fn run_sweeps(&self) -> Result<SweepReport, GovernanceError> {
        let _span = spans::sweep_span().entered();
        let mut report = SweepReport::default();
        let now = self.now();

        for poll in self.list_polls(Some(PollStatus::Open))? {
            let early = poll.kind.is_emergency() && poll.quorum_reached_at.is_some();
            if now < poll.closes_at && !early {
                continue;
            }
            match self.close_poll(poll.id) {
                Ok(true) => report.closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(poll = %poll.id, error = %e, "close failed");
                    report.errors += 1;
                }
            }
        }

        for poll in self.list_polls(Some(PollStatus::Closed))? {
            match self.resolve_poll(poll.id) {
                Ok(true) => report.resolved += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(poll = %poll.id, error = %e, "resolve failed");
                    report.errors += 1;
                }
            }
        }

        for poll in self.list_polls(None)? {
            let finished = matches!(
                poll.status,
                PollStatus::Resolved | PollStatus::RolledBack | PollStatus::Withdrawn
            );
            if !finished || poll.stakes_settled {
                continue;
            }
            match self.settle_stakes(poll.id) {
                Ok(s) => {
                    report.stakes_settled += s.won + s.lost;
                    report.refunded += s.refunded;
                }
                Err(e) => {
                    warn!(poll = %poll.id, error = %e, "stake settlement failed");
                    report.errors += 1;
                }
            }
        }

        report.petitions_expired = self.expire_rollbacks()?;

        if !report.is_idle() {
            info!(
                closed = report.closed,
                resolved = report.resolved,
                settled = report.stakes_settled,
                refunded = report.refunded,
                expired = report.petitions_expired,
                errors = report.errors,
                "sweep finished"
            );
        }
        Ok(report)
    }
}
