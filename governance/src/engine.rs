//! The governance engine: collaborator wiring and helpers shared by every
//! operation.
//!
//! The engine is synchronous and holds no in-process state besides its
//! handles. Every mutation is one guarded store commit; a commit whose guards
//! no longer hold is re-read and retried a bounded number of times.

use std::sync::Arc;

use tracing::{debug, warn};

use dyad_consti::ConstiDocument;
use dyad_external::{ArchiveKind, ArchiveRecord, Clock, EntropySource, IdentityService, TokenEconomy};
use dyad_store::{GovernanceStore, Table};
use dyad_types::{GovernanceParams, IdentityMode, PollId, Timestamp, UserId};

use crate::archive::{ballot_record, ArchiveHandle};
use crate::ballot::Ballot;
use crate::codec::{self, keys, Versioned};
use crate::error::GovernanceError;
use crate::poll::{Poll, PollStatus};
use crate::whitelist;

/// Upper bound on optimistic commit attempts for one operation.
pub const MAX_COMMIT_ATTEMPTS: usize = 64;

/// The external services the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub identity: Arc<dyn IdentityService>,
    pub tokens: Arc<dyn TokenEconomy>,
    pub entropy: Arc<dyn EntropySource>,
}

pub struct GovernanceEngine {
    pub(crate) store: Arc<dyn GovernanceStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) identity: Arc<dyn IdentityService>,
    pub(crate) tokens: Arc<dyn TokenEconomy>,
    pub(crate) entropy: Arc<dyn EntropySource>,
    pub(crate) archive: Option<ArchiveHandle>,
    params: GovernanceParams,
}

impl GovernanceEngine {
    pub fn new(store: Arc<dyn GovernanceStore>, params: GovernanceParams, collaborators: Collaborators) -> Self {
        Self {
            store,
            clock: collaborators.clock,
            identity: collaborators.identity,
            tokens: collaborators.tokens,
            entropy: collaborators.entropy,
            archive: None,
            params,
        }
    }

    /// Mirror created/resolved/rolled-back polls and every ballot to `handle`.
    pub fn with_archive(mut self, handle: ArchiveHandle) -> Self {
        self.archive = Some(handle);
        self
    }

    /// Configured parameters, before enacted whitelist values are applied.
    pub fn base_params(&self) -> &GovernanceParams {
        &self.params
    }

    /// Parameters in force now: the configured base with enacted values on top.
    pub fn effective_params(&self) -> Result<GovernanceParams, GovernanceError> {
        whitelist::effective_params(self.store.as_ref(), &self.params)
    }

    pub fn store(&self) -> &Arc<dyn GovernanceStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The seeded constitution, or the genesis articles on an unseeded store.
    pub fn constitution(&self) -> Result<ConstiDocument, GovernanceError> {
        Ok(codec::load::<ConstiDocument>(self.store.as_ref(), Table::Constitution, keys::CONSTITUTION)?
            .map(|v| v.value)
            .unwrap_or_else(ConstiDocument::genesis))
    }

    pub(crate) fn load_poll(&self, id: PollId) -> Result<Versioned<Poll>, GovernanceError> {
        codec::load(self.store.as_ref(), Table::Polls, &keys::poll(id))?.ok_or(GovernanceError::PollNotFound(id))
    }

    pub(crate) fn load_polls(&self) -> Result<Vec<Versioned<Poll>>, GovernanceError> {
        codec::load_all(self.store.as_ref(), Table::Polls, &[])
    }

    pub(crate) fn require_verified(&self, user: &UserId, mode: IdentityMode) -> Result<(), GovernanceError> {
        if self.identity.is_verified_human(user, mode)? {
            Ok(())
        } else {
            debug!(mode = %mode, "rejected: identity not verified");
            Err(GovernanceError::NotVerified(mode))
        }
    }

    /// Run `attempt` until it commits. `Ok(None)` from `attempt` means a
    /// guard failed and the operation should re-read and try again.
    pub(crate) fn retry_commit<T>(
        &self,
        what: &'static str,
        mut attempt: impl FnMut() -> Result<Option<T>, GovernanceError>,
    ) -> Result<T, GovernanceError> {
        for round in 0..MAX_COMMIT_ATTEMPTS {
            if let Some(done) = attempt()? {
                return Ok(done);
            }
            debug!(what, round, "commit guard failed, retrying");
        }
        warn!(what, attempts = MAX_COMMIT_ATTEMPTS, "giving up after repeated contention");
        Err(GovernanceError::Contended(what))
    }

    pub(crate) fn archive_poll(&self, kind: ArchiveKind, poll: &Poll) {
        let Some(handle) = &self.archive else { return };
        match serde_json::to_value(poll) {
            Ok(payload) => handle.submit(ArchiveRecord::new(
                kind,
                format!("{}/{}", poll.id, poll.status),
                payload,
                self.now(),
            )),
            Err(e) => warn!(poll = %poll.id, error = %e, "could not encode poll for archive"),
        }
    }

    pub(crate) fn archive_ballot(&self, ballot: &Ballot) {
        if let Some(handle) = &self.archive {
            handle.submit(ballot_record(ballot, handle.voter_key()));
        }
    }
}

/// Poll statuses a status filter accepts; `None` accepts all.
pub(crate) fn status_matches(filter: Option<PollStatus>, status: PollStatus) -> bool {
    filter.map_or(true, |f| f == status)
}
