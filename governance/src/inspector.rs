//! Read-only view over a governance store, for operators and tooling.
//!
//! Needs no collaborators and never writes: the shadow consensus shown here
//! is computed on the fly and not persisted.

use std::sync::Arc;

use dyad_consti::ConstiDocument;
use dyad_store::{GovernanceStore, Table};
use dyad_types::{PollId, Timestamp};

use crate::ballot::Ballot;
use crate::codec::{self, keys};
use crate::engine::status_matches;
use crate::error::GovernanceError;
use crate::poll::{Poll, PollStatus};
use crate::rollback::RollbackAction;
use crate::shadow::ShadowConsensus;
use crate::tally::Tally;
use crate::whitelist::{self, WhitelistEntry};

pub struct PollInspector {
    store: Arc<dyn GovernanceStore>,
}

impl PollInspector {
    pub fn new(store: Arc<dyn GovernanceStore>) -> Self {
        Self { store }
    }

    pub fn get_poll(&self, poll_id: PollId) -> Result<Poll, GovernanceError> {
        codec::load(self.store.as_ref(), Table::Polls, &keys::poll(poll_id))?
            .map(|v| v.value)
            .ok_or(GovernanceError::PollNotFound(poll_id))
    }

    pub fn list_polls(&self, status: Option<PollStatus>) -> Result<Vec<Poll>, GovernanceError> {
        Ok(codec::load_all::<Poll>(self.store.as_ref(), Table::Polls, &[])?
            .into_iter()
            .map(|v| v.value)
            .filter(|p| status_matches(status, p.status))
            .collect())
    }

    /// Final tally for resolved polls, otherwise the live tally.
    pub fn tally(&self, poll_id: PollId) -> Result<Tally, GovernanceError> {
        let poll = self.get_poll(poll_id)?;
        if let Some(tally) = poll.final_tally {
            return Ok(tally);
        }
        let ballots: Vec<Ballot> = codec::load_all::<Ballot>(self.store.as_ref(), Table::Ballots, &keys::poll(poll_id))?
            .into_iter()
            .map(|v| v.value)
            .collect();
        Ok(Tally::from_ballots(&ballots))
    }

    pub fn shadow_consensus(&self, poll_id: PollId, now: Timestamp) -> Result<ShadowConsensus, GovernanceError> {
        Ok(ShadowConsensus::from_tally(poll_id, &self.tally(poll_id)?, now))
    }

    pub fn rollback_action(&self, poll_id: PollId) -> Result<Option<RollbackAction>, GovernanceError> {
        Ok(codec::load(self.store.as_ref(), Table::Rollbacks, &keys::poll(poll_id))?.map(|v| v.value))
    }

    pub fn whitelist(&self) -> Result<Vec<WhitelistEntry>, GovernanceError> {
        whitelist::list_entries(self.store.as_ref())
    }

    pub fn constitution(&self) -> Result<Option<ConstiDocument>, GovernanceError> {
        Ok(codec::load(self.store.as_ref(), Table::Constitution, keys::CONSTITUTION)?.map(|v| v.value))
    }
}
