//! Emergency rollback of an enacted decision.
//!
//! Three tiers may reverse a poll that resolved `PASSED`, all within the
//! rollback window that starts at resolution:
//!
//! - **founder**: spends one token from a finite, non-replenishing allowance
//!   that also hard-expires; executes immediately,
//! - **petition**: verified True Selves sign; the threshold-reaching
//!   signature executes,
//! - **automatic**: a trusted detector reports constitutional violations,
//!   which are re-checked against the enacted change before executing.
//!
//! Execution marks the poll `RolledBack` (terminal), restores the previous
//! whitelist value and finalises the action, all in one guarded commit. A
//! pending petition that never reaches its threshold expires in the sweeps.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use dyad_consti::confirm_violations;
use dyad_external::ArchiveKind;
use dyad_store::{Table, WriteBatch};
use dyad_types::{GovernanceParams, IdentityMode, PollId, RollbackId, Timestamp, UserId};

use crate::codec::{self, keys, Versioned};
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::poll::{Outcome, Poll, PollStatus};
use crate::spans;
use crate::whitelist;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackTier {
    Founder,
    Petition,
    Automatic,
}

impl fmt::Display for RollbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RollbackTier::Founder => "founder",
            RollbackTier::Petition => "petition",
            RollbackTier::Automatic => "automatic",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Pending,
    Executed,
    Expired,
}

/// A violation report from an external detector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub detector: String,
    pub poll_id: PollId,
    pub violated_articles: Vec<u32>,
    pub detected_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RollbackRequest {
    Founder { poll_id: PollId, caller: UserId },
    Petition { poll_id: PollId, signer: UserId },
    Automatic(DetectionEvent),
}

impl RollbackRequest {
    pub fn poll_id(&self) -> PollId {
        match self {
            RollbackRequest::Founder { poll_id, .. } | RollbackRequest::Petition { poll_id, .. } => *poll_id,
            RollbackRequest::Automatic(event) => event.poll_id,
        }
    }

    pub fn tier(&self) -> RollbackTier {
        match self {
            RollbackRequest::Founder { .. } => RollbackTier::Founder,
            RollbackRequest::Petition { .. } => RollbackTier::Petition,
            RollbackRequest::Automatic(_) => RollbackTier::Automatic,
        }
    }
}

/// The rollback record of one poll. At most one exists per poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackAction {
    pub id: RollbackId,
    pub poll_id: PollId,
    /// The tier that opened the action, or that executed it.
    pub tier: RollbackTier,
    /// Founder, or petition signers in signing order.
    pub initiators: Vec<UserId>,
    /// Founder tokens left after this action, for founder executions.
    pub founder_tokens_remaining: Option<u32>,
    pub window_expires_at: Timestamp,
    pub status: RollbackStatus,
    pub created_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub detection: Option<DetectionEvent>,
}

/// The founder's remaining rollback allowance, a versioned row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderAuthority {
    pub founder: UserId,
    pub remaining: u32,
    /// Bumped on every spend.
    pub version: u64,
    pub expires_at: Timestamp,
}

impl GovernanceEngine {
    /// Start or advance a rollback of `request.poll_id()`.
    pub fn initiate_rollback(&self, request: RollbackRequest) -> Result<RollbackAction, GovernanceError> {
        let _span = spans::rollback_span(&request.tier().to_string(), request.poll_id()).entered();
        match &request {
            RollbackRequest::Founder { caller: user, .. } | RollbackRequest::Petition { signer: user, .. } => {
                user.validate()?
            }
            RollbackRequest::Automatic(_) => {}
        }
        let params = self.effective_params()?;
        let action = match &request {
            RollbackRequest::Founder { poll_id, caller } => self.founder_rollback(*poll_id, caller)?,
            RollbackRequest::Petition { poll_id, signer } => self.petition_rollback(*poll_id, signer, &params)?,
            RollbackRequest::Automatic(event) => self.automatic_rollback(event, &params)?,
        };
        if action.status == RollbackStatus::Executed {
            let poll = self.load_poll(action.poll_id)?.value;
            info!(poll = %action.poll_id, tier = %action.tier, "decision rolled back");
            self.archive_poll(ArchiveKind::PollRolledBack, &poll);
        }
        Ok(action)
    }

    pub fn get_rollback(&self, poll_id: PollId) -> Result<Option<RollbackAction>, GovernanceError> {
        Ok(self.load_action(poll_id)?.map(|v| v.value))
    }

    pub fn founder_authority(&self) -> Result<Option<FounderAuthority>, GovernanceError> {
        Ok(codec::load::<FounderAuthority>(self.store.as_ref(), Table::Authority, keys::FOUNDER)?.map(|v| v.value))
    }

    fn load_action(&self, poll_id: PollId) -> Result<Option<Versioned<RollbackAction>>, GovernanceError> {
        codec::load(self.store.as_ref(), Table::Rollbacks, &keys::poll(poll_id))
    }

    fn founder_rollback(&self, poll_id: PollId, caller: &UserId) -> Result<RollbackAction, GovernanceError> {
        let mut reserved_id = None;
        self.retry_commit("founder rollback", || {
            let now = self.now();
            let authority: Versioned<FounderAuthority> =
                codec::load(self.store.as_ref(), Table::Authority, keys::FOUNDER)?.ok_or(GovernanceError::NotFounder)?;
            if &authority.value.founder != caller {
                return Err(GovernanceError::NotFounder);
            }
            if authority.value.expires_at.has_expired(0, now) {
                return Err(GovernanceError::FounderAuthorityExpired);
            }
            let poll = self.load_poll(poll_id)?;
            let existing = self.load_action(poll_id)?;
            let window_expires_at = check_rollbackable(&poll.value, existing.as_ref().map(|a| &a.value), now)?;
            let remaining = authority
                .value
                .remaining
                .checked_sub(1)
                .ok_or(GovernanceError::FounderTokensExhausted)?;

            let spent = FounderAuthority {
                remaining,
                version: authority.value.version + 1,
                ..authority.value.clone()
            };
            let mut action = match &existing {
                Some(a) => a.value.clone(),
                None => self.new_action(&mut reserved_id, poll_id, RollbackTier::Founder, window_expires_at, now)?,
            };
            action.tier = RollbackTier::Founder;
            action.initiators.push(caller.clone());
            action.founder_tokens_remaining = Some(remaining);

            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Authority, keys::FOUNDER, &authority.raw)
                .put(Table::Authority, keys::FOUNDER, &codec::encode(&spent)?);
            self.execution(&mut batch, &poll, existing.as_ref(), &mut action, now)?;
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(remaining, "founder rollback token spent");
            Ok(Some(action))
        })
    }

    fn petition_rollback(
        &self,
        poll_id: PollId,
        signer: &UserId,
        params: &GovernanceParams,
    ) -> Result<RollbackAction, GovernanceError> {
        self.require_verified(signer, IdentityMode::TrueSelf)?;
        let signature_key = keys::poll_user(poll_id, signer);
        let threshold = params.petition_signature_threshold.max(1) as usize;
        let mut reserved_id = None;

        self.retry_commit("petition rollback", || {
            let now = self.now();
            let poll = self.load_poll(poll_id)?;
            let existing = self.load_action(poll_id)?;
            let window_expires_at = check_rollbackable(&poll.value, existing.as_ref().map(|a| &a.value), now)?;
            if self.store.get(Table::Signatures, &signature_key)?.is_some() {
                return Err(GovernanceError::DuplicateSignature);
            }

            let mut action = match &existing {
                Some(a) => a.value.clone(),
                None => self.new_action(&mut reserved_id, poll_id, RollbackTier::Petition, window_expires_at, now)?,
            };
            action.initiators.push(signer.clone());

            let mut batch = WriteBatch::new();
            batch
                .expect_absent(Table::Signatures, &signature_key)
                .put(Table::Signatures, &signature_key, &codec::encode(&now)?);
            if action.initiators.len() >= threshold {
                self.execution(&mut batch, &poll, existing.as_ref(), &mut action, now)?;
            } else {
                let key = keys::poll(poll_id);
                batch
                    .expect_value(Table::Polls, &key, &poll.raw)
                    .expect(Table::Rollbacks, &key, existing.as_ref().map(|a| a.raw.as_slice()))
                    .put(Table::Rollbacks, &key, &codec::encode(&action)?);
            }
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(signatures = action.initiators.len(), threshold, "petition signed");
            Ok(Some(action))
        })
    }

    fn automatic_rollback(
        &self,
        event: &DetectionEvent,
        params: &GovernanceParams,
    ) -> Result<RollbackAction, GovernanceError> {
        if !params.trusted_detectors.iter().any(|d| d == &event.detector) {
            return Err(GovernanceError::UntrustedDetector(event.detector.clone()));
        }
        let poll_id = event.poll_id;
        let mut reserved_id = None;

        self.retry_commit("automatic rollback", || {
            let now = self.now();
            let poll = self.load_poll(poll_id)?;
            let existing = self.load_action(poll_id)?;
            let window_expires_at = check_rollbackable(&poll.value, existing.as_ref().map(|a| &a.value), now)?;
            let enactment = poll.value.enactment.as_ref().ok_or_else(|| {
                GovernanceError::Constitution(dyad_consti::ConstiError::Other(
                    "poll enacted no parameter change".into(),
                ))
            })?;
            confirm_violations(
                &self.constitution()?,
                &event.violated_articles,
                &enactment.parameter,
                &enactment.applied,
            )?;

            let mut action = match &existing {
                Some(a) => a.value.clone(),
                None => self.new_action(&mut reserved_id, poll_id, RollbackTier::Automatic, window_expires_at, now)?,
            };
            action.tier = RollbackTier::Automatic;
            action.detection = Some(event.clone());

            let mut batch = WriteBatch::new();
            self.execution(&mut batch, &poll, existing.as_ref(), &mut action, now)?;
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            Ok(Some(action))
        })
    }

    fn new_action(
        &self,
        reserved_id: &mut Option<RollbackId>,
        poll_id: PollId,
        tier: RollbackTier,
        window_expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<RollbackAction, GovernanceError> {
        let id = match *reserved_id {
            Some(id) => id,
            None => *reserved_id.insert(self.store.next_sequence("rollbacks")?),
        };
        Ok(RollbackAction {
            id,
            poll_id,
            tier,
            initiators: Vec::new(),
            founder_tokens_remaining: None,
            window_expires_at,
            status: RollbackStatus::Pending,
            created_at: now,
            executed_at: None,
            detection: None,
        })
    }

    /// Add the writes that execute `action` against `poll` to `batch`.
    fn execution(
        &self,
        batch: &mut WriteBatch,
        poll: &Versioned<Poll>,
        existing: Option<&Versioned<RollbackAction>>,
        action: &mut RollbackAction,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        if let Some(enactment) = &poll.value.enactment {
            let entry = whitelist::load_entry(self.store.as_ref(), &enactment.parameter)?
                .ok_or_else(|| GovernanceError::ParameterNotWhitelisted(enactment.parameter.clone()))?;
            if entry.value.current_value != enactment.applied {
                return Err(GovernanceError::RevertConflict {
                    parameter: enactment.parameter.clone(),
                });
            }
            let mut restored = entry.value.clone();
            restored.current_value = enactment.previous.clone();
            restored.updated_at = now;
            batch
                .expect_value(Table::Whitelist, enactment.parameter.as_bytes(), &entry.raw)
                .put(Table::Whitelist, enactment.parameter.as_bytes(), &codec::encode(&restored)?);
        }

        let mut rolled_back = poll.value.clone();
        rolled_back.status = PollStatus::RolledBack;
        rolled_back.rolled_back_at = Some(now);

        action.status = RollbackStatus::Executed;
        action.executed_at = Some(now);

        let key = keys::poll(poll.value.id);
        batch
            .expect_value(Table::Polls, &key, &poll.raw)
            .put(Table::Polls, &key, &codec::encode(&rolled_back)?)
            .expect(Table::Rollbacks, &key, existing.map(|a| a.raw.as_slice()))
            .put(Table::Rollbacks, &key, &codec::encode(&*action)?);
        Ok(())
    }

    /// Move pending actions whose window has passed to `Expired`.
    pub(crate) fn expire_rollbacks(&self) -> Result<usize, GovernanceError> {
        let now = self.now();
        let mut expired = 0;
        for current in codec::load_all::<RollbackAction>(self.store.as_ref(), Table::Rollbacks, &[])? {
            if current.value.status != RollbackStatus::Pending || !current.value.window_expires_at.has_expired(0, now) {
                continue;
            }
            let mut updated = current.value.clone();
            updated.status = RollbackStatus::Expired;
            let key = keys::poll(updated.poll_id);
            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Rollbacks, &key, &current.raw)
                .put(Table::Rollbacks, &key, &codec::encode(&updated)?);
            if self.store.commit(&batch)?.is_committed() {
                info!(poll = %updated.poll_id, signatures = updated.initiators.len(), "rollback window expired");
                expired += 1;
            }
        }
        Ok(expired)
    }
}

/// Preconditions shared by every tier. Returns the window's end.
fn check_rollbackable(
    poll: &Poll,
    action: Option<&RollbackAction>,
    now: Timestamp,
) -> Result<Timestamp, GovernanceError> {
    if poll.status == PollStatus::RolledBack {
        return Err(GovernanceError::AlreadyRolledBack);
    }
    let window_expires_at = match (poll.status, poll.outcome, poll.rollback_window_expires_at) {
        (PollStatus::Resolved, Some(Outcome::Passed), Some(at)) => at,
        _ => return Err(GovernanceError::NothingToRollBack { status: poll.status }),
    };
    if window_expires_at.has_expired(0, now) {
        return Err(GovernanceError::RollbackWindowExpired);
    }
    if action.is_some_and(|a| a.status != RollbackStatus::Pending) {
        return Err(GovernanceError::RollbackNotPending);
    }
    Ok(window_expires_at)
}
