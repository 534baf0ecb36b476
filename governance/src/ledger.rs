//! Vote ledger: casting and changing ballots.
//!
//! One live ballot exists per (poll, voter, mode). A change rewrites that
//! ballot under the same id and section draw, bumping `change_count`. Weight
//! is the voter's persisted multiplier times one plus the delegators the
//! ballot carries.

use tracing::{debug, info, warn};

use dyad_store::{Table, WriteBatch};
use dyad_types::{GovernanceParams, IdentityMode, PollId, Timestamp, UserId};

use crate::ballot::{Ballot, BallotRequest, BallotView};
use crate::codec::{self, keys, Versioned};
use crate::delegation::carry_guards;
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::poll::{Poll, PollStatus};
use crate::section;
use crate::spans;
use crate::tally::{quorum_met, Tally};

#[derive(Clone, Copy, PartialEq, Eq)]
enum BallotOp {
    Cast,
    Change,
}

impl BallotOp {
    fn name(self) -> &'static str {
        match self {
            BallotOp::Cast => "cast_vote",
            BallotOp::Change => "change_vote",
        }
    }
}

impl GovernanceEngine {
    /// Cast the first ballot of `voter` in `mode` on a poll.
    pub fn cast_vote(&self, request: BallotRequest) -> Result<BallotView, GovernanceError> {
        self.record_ballot(request, BallotOp::Cast)
    }

    /// Replace an existing ballot. The section draw is read back, never redrawn.
    pub fn change_vote(&self, request: BallotRequest) -> Result<BallotView, GovernanceError> {
        self.record_ballot(request, BallotOp::Change)
    }

    /// `voter`'s ballot in one mode. Only the voter may read it.
    pub fn get_ballot(
        &self,
        poll_id: PollId,
        voter: &UserId,
        mode: IdentityMode,
        caller: &UserId,
    ) -> Result<Option<BallotView>, GovernanceError> {
        voter.validate()?;
        if caller != voter {
            return Err(GovernanceError::NotBallotOwner);
        }
        Ok(codec::load::<Ballot>(self.store.as_ref(), Table::Ballots, &keys::poll_mode_user(poll_id, mode, voter))?
            .map(|v| v.value.view()))
    }

    pub(crate) fn load_ballots(&self, poll_id: PollId) -> Result<Vec<Ballot>, GovernanceError> {
        Ok(codec::load_all::<Ballot>(self.store.as_ref(), Table::Ballots, &keys::poll(poll_id))?
            .into_iter()
            .map(|v| v.value)
            .collect())
    }

    fn record_ballot(&self, request: BallotRequest, op: BallotOp) -> Result<BallotView, GovernanceError> {
        let _span = spans::ballot_span(op.name(), request.poll_id).entered();
        request.voter.validate()?;
        let params = self.effective_params()?;
        if let Some(reasoning) = &request.reasoning {
            if reasoning.len() > params.max_reasoning_len {
                return Err(GovernanceError::InvalidInput(format!(
                    "reasoning exceeds {} bytes",
                    params.max_reasoning_len
                )));
            }
        }
        self.require_verified(&request.voter, request.mode)?;

        let ballot_key = keys::poll_mode_user(request.poll_id, request.mode, &request.voter);
        let mut reserved_id = None;

        let (ballot, poll) = self.retry_commit(op.name(), || {
            let now = self.now();
            let poll = self.load_poll(request.poll_id)?;
            if poll.value.status != PollStatus::Open {
                return Err(GovernanceError::PollNotOpen(poll.value.status));
            }
            if now >= poll.value.closes_at {
                return Err(GovernanceError::VotingClosed);
            }
            if self.store.get(Table::Carried, &ballot_key)?.is_some() {
                debug!(mode = %request.mode, "rejected: base weight already carried by a delegate");
                return Err(GovernanceError::DelegatedVoteCarried(request.poll_id));
            }

            let existing = codec::load::<Ballot>(self.store.as_ref(), Table::Ballots, &ballot_key)?;
            match (op, &existing) {
                (BallotOp::Cast, Some(_)) => return Err(GovernanceError::AlreadyVoted(request.poll_id)),
                (BallotOp::Change, None) => return Err(GovernanceError::BallotNotFound(request.poll_id)),
                (BallotOp::Change, Some(b)) if b.value.change_count >= params.max_vote_changes => {
                    return Err(GovernanceError::ChangeLimitExceeded {
                        max: params.max_vote_changes,
                    })
                }
                _ => {}
            }

            let draw = section::ensure_draw(
                self.store.as_ref(),
                request.poll_id,
                &request.voter,
                request.mode,
                params.multiplier_min_bps,
                params.multiplier_max_bps,
            )?;
            let carried = self.carried_delegators(request.poll_id, request.mode, &request.voter)?;
            let displayed_at = self.jittered(now, &poll.value, params.vote_jitter_max_secs)?;

            let id = match (&existing, reserved_id) {
                (Some(b), _) => b.value.id,
                (None, Some(id)) => id,
                (None, None) => *reserved_id.insert(self.store.next_sequence("votes")?),
            };
            let ballot = Ballot {
                id,
                poll_id: request.poll_id,
                voter: request.voter.clone(),
                mode: request.mode,
                section: draw.section,
                multiplier_bps: draw.multiplier_bps,
                choice: request.choice,
                effective_weight_bps: draw.multiplier_bps as u64 * (1 + carried.len() as u64),
                carried,
                cast_at: now,
                displayed_at,
                change_count: existing.as_ref().map_or(0, |b| b.value.change_count + 1),
                reasoning: request.reasoning.clone(),
            };

            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Meta, &keys::open_gate(request.poll_id), b"open")
                .expect(Table::Ballots, &ballot_key, existing.as_ref().map(|b| b.raw.as_slice()))
                .expect_absent(Table::Carried, &ballot_key)
                .put(Table::Ballots, &ballot_key, &codec::encode(&ballot)?);
            carry_guards(&mut batch, &ballot, existing.as_ref().map(|b| &b.value))?;
            if !poll.value.has_ballots {
                let mut marked = poll.value.clone();
                marked.has_ballots = true;
                let poll_key = keys::poll(request.poll_id);
                batch
                    .expect_value(Table::Polls, &poll_key, &poll.raw)
                    .put(Table::Polls, &poll_key, &codec::encode(&marked)?);
            }

            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            Ok(Some((ballot, poll.value)))
        })?;

        info!(
            poll = %ballot.poll_id,
            mode = %ballot.mode,
            change = ballot.change_count,
            carried = ballot.carried.len(),
            "ballot recorded"
        );
        self.archive_ballot(&ballot);

        if poll.quorum_reached_at.is_none() {
            if let Err(e) = self.latch_quorum(ballot.poll_id) {
                warn!(poll = %ballot.poll_id, error = %e, "quorum check after ballot failed");
            }
        }
        Ok(ballot.view())
    }

    /// Displayed cast time: `now` moved by a uniform offset in
    /// `[-max, +max]`, kept inside the poll's voting window.
    fn jittered(&self, now: Timestamp, poll: &Poll, max_secs: u64) -> Result<Timestamp, GovernanceError> {
        let max_secs = max_secs.min(GovernanceParams::MAX_VOTE_JITTER_SECS);
        if max_secs == 0 {
            return Ok(now);
        }
        let mut bytes = [0u8; 8];
        self.entropy.fill(&mut bytes)?;
        let span = max_secs * 2 + 1;
        let offset = (u64::from_be_bytes(bytes) % span) as i64 - max_secs as i64;
        Ok(now.offset_by(offset).max(poll.opens_at).min(poll.closes_at))
    }

    /// Record the first moment quorum holds. Emergency polls close and
    /// resolve as soon as it does.
    pub(crate) fn latch_quorum(&self, poll_id: PollId) -> Result<bool, GovernanceError> {
        let latched = self.retry_commit("quorum latch", || {
            let current: Versioned<Poll> = self.load_poll(poll_id)?;
            let poll = &current.value;
            if poll.status != PollStatus::Open || poll.quorum_reached_at.is_some() {
                return Ok(Some(false));
            }
            let tally = Tally::from_ballots(&self.load_ballots(poll_id)?);
            if !quorum_met(&poll.quorum, &tally, poll.eligible_voters) {
                return Ok(Some(false));
            }
            let mut updated = poll.clone();
            updated.quorum_reached_at = Some(self.now());
            let key = keys::poll(poll_id);
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Polls, &key, &current.raw)
                .put(Table::Polls, &key, &codec::encode(&updated)?);
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(poll = %poll_id, participants = tally.participants, "quorum reached");
            Ok(Some(true))
        })?;

        if latched && self.load_poll(poll_id)?.value.kind.is_emergency() {
            self.close_poll(poll_id)?;
            self.resolve_poll(poll_id)?;
        }
        Ok(latched)
    }
}
