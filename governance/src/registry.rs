//! Poll registry: creation, withdrawal, lookup and closing.

use tracing::{debug, info};

use dyad_consti::check_change;
use dyad_external::ArchiveKind;
use dyad_store::{Table, WriteBatch};
use dyad_types::{IdentityMode, PollId, UserId};

use crate::codec::{self, keys};
use crate::engine::{status_matches, GovernanceEngine};
use crate::error::GovernanceError;
use crate::poll::{CreatePoll, Poll, PollKind, PollStatus};
use crate::spans;
use crate::whitelist;

/// Longest accepted poll description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 20_000;

const GATE_OPEN: &[u8] = b"open";

impl GovernanceEngine {
    /// Validate a proposal and open it as a poll.
    ///
    /// A change to a constitutionally protected value is rejected before
    /// anything else is looked at, with the matched articles attached.
    pub fn create_poll(&self, input: CreatePoll) -> Result<Poll, GovernanceError> {
        let _span = spans::create_poll_span(input.kind.name()).entered();
        input.creator.validate()?;
        let params = self.effective_params()?;

        let title = input.title.trim();
        if title.is_empty() {
            return Err(GovernanceError::InvalidInput("title must not be empty".into()));
        }
        if title.chars().count() > params.max_title_len {
            return Err(GovernanceError::InvalidInput(format!(
                "title exceeds {} characters",
                params.max_title_len
            )));
        }
        if input.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(GovernanceError::InvalidInput(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        let entry = match input.kind.change() {
            Some(change) => {
                let violations = check_change(&self.constitution()?, &change.parameter, &change.value);
                if !violations.is_empty() {
                    info!(parameter = %change.parameter, articles = violations.len(), "proposal blocked by constitution");
                    return Err(GovernanceError::ConstitutionalViolation(violations));
                }
                let entry = whitelist::load_entry(self.store.as_ref(), &change.parameter)?
                    .ok_or_else(|| GovernanceError::ParameterNotWhitelisted(change.parameter.clone()))?
                    .value;
                entry.validate(&change.value)?;
                Some(entry)
            }
            None => None,
        };

        let needs_verification = entry.as_ref().map_or(true, |e| e.requires_verification);
        if needs_verification {
            self.require_verified(&input.creator, IdentityMode::TrueSelf)?;
        }
        let reputation = self.identity.reputation(&input.creator)?;
        if reputation < params.min_proposer_reputation {
            debug!(have = reputation, need = params.min_proposer_reputation, "rejected: reputation too low");
            return Err(GovernanceError::InsufficientReputation {
                have: reputation,
                need: params.min_proposer_reputation,
            });
        }

        let (quorum, supermajority_bps, duration, category) = match (&input.kind, &entry) {
            (PollKind::ParameterVote(_), Some(e)) => {
                (e.quorum, e.supermajority_bps, e.voting_duration_secs, e.category.clone())
            }
            (PollKind::Emergency(_), e) => (
                params.emergency_quorum,
                params.emergency_supermajority_bps,
                params.emergency_duration_secs,
                e.as_ref().map_or_else(|| "emergency".to_string(), |e| e.category.clone()),
            ),
            _ => (
                params.general_quorum,
                None,
                params.general_duration_secs,
                "general".to_string(),
            ),
        };
        if !quorum.is_well_formed() {
            return Err(GovernanceError::InvalidInput("quorum configuration is malformed".into()));
        }

        let eligible_voters = self.identity.verified_user_count()?;
        let now = self.now();
        let id = PollId::new(self.store.next_sequence("polls")?);
        let poll = Poll {
            id,
            kind: input.kind,
            title: title.to_string(),
            description: input.description,
            creator: input.creator,
            category,
            status: PollStatus::Open,
            quorum,
            supermajority_bps,
            opens_at: now,
            closes_at: now.plus_secs(duration),
            eligible_voters,
            has_ballots: false,
            quorum_reached_at: None,
            closed_at: None,
            resolved_at: None,
            outcome: None,
            final_tally: None,
            enactment: None,
            stakes_settled: false,
            rollback_window_expires_at: None,
            rolled_back_at: None,
        };

        let key = keys::poll(id);
        let mut batch = WriteBatch::new();
        batch
            .expect_absent(Table::Polls, &key)
            .put(Table::Polls, &key, &codec::encode(&poll)?)
            .put(Table::Meta, &keys::open_gate(id), GATE_OPEN);
        if !self.store.commit(&batch)?.is_committed() {
            return Err(GovernanceError::Contended("poll id"));
        }

        info!(poll = %id, kind = poll.kind.name(), closes_at = %poll.closes_at, eligible_voters, "poll opened");
        self.archive_poll(ArchiveKind::PollCreated, &poll);
        Ok(poll)
    }

    /// Withdraw an open poll nobody has voted on. Creator only.
    pub fn withdraw_poll(&self, poll_id: PollId, caller: &UserId) -> Result<Poll, GovernanceError> {
        caller.validate()?;
        self.retry_commit("withdraw poll", || {
            let current = self.load_poll(poll_id)?;
            let poll = &current.value;
            if &poll.creator != caller {
                return Err(GovernanceError::NotCreator);
            }
            if poll.status != PollStatus::Open {
                return Err(GovernanceError::PollNotOpen(poll.status));
            }
            if poll.has_ballots {
                return Err(GovernanceError::PollHasBallots);
            }

            let mut updated = poll.clone();
            updated.status = PollStatus::Withdrawn;
            updated.closed_at = Some(self.now());

            let key = keys::poll(poll_id);
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Polls, &key, &current.raw)
                .put(Table::Polls, &key, &codec::encode(&updated)?)
                .delete(Table::Meta, &keys::open_gate(poll_id));
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(poll = %poll_id, "poll withdrawn");
            Ok(Some(updated))
        })
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<Poll, GovernanceError> {
        Ok(self.load_poll(poll_id)?.value)
    }

    /// Polls in id order, optionally filtered by status.
    pub fn list_polls(&self, status: Option<PollStatus>) -> Result<Vec<Poll>, GovernanceError> {
        Ok(self
            .load_polls()?
            .into_iter()
            .map(|v| v.value)
            .filter(|p| status_matches(status, p.status))
            .collect())
    }

    /// Close an open poll whose voting period is over, or an emergency poll
    /// whose quorum has latched.
    ///
    /// Returns `false` when the poll was no longer open: closing twice is a
    /// no-op.
    pub fn close_poll(&self, poll_id: PollId) -> Result<bool, GovernanceError> {
        self.retry_commit("close poll", || {
            let current = self.load_poll(poll_id)?;
            let poll = &current.value;
            if poll.status != PollStatus::Open {
                return Ok(Some(false));
            }
            let now = self.now();
            let early = poll.kind.is_emergency() && poll.quorum_reached_at.is_some();
            if now < poll.closes_at && !early {
                return Err(GovernanceError::VotingStillOpen);
            }

            let mut updated = poll.clone();
            updated.status = PollStatus::Closed;
            updated.closed_at = Some(now);

            let key = keys::poll(poll_id);
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Polls, &key, &current.raw)
                .put(Table::Polls, &key, &codec::encode(&updated)?)
                .delete(Table::Meta, &keys::open_gate(poll_id));
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(poll = %poll_id, early, "poll closed");
            Ok(Some(true))
        })
    }
}
