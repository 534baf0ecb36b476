//! Vote delegation: entrust one identity's base weight to another identity
//! of the same mode.
//!
//! Delegation is single-hop. Each (mode, user) holds at most one role: it
//! either delegates (to exactly one delegate) or receives (from any number of
//! delegators). A receiver cannot delegate onward and a delegator cannot
//! receive, so chains and cycles cannot form. Roles are guarded rows, which
//! keeps the rule intact under concurrent requests.
//!
//! Delegation affects ballots cast afterwards only. A committed ballot keeps
//! the delegators it carried; revocation takes effect on the delegate's next
//! ballot change.

use serde::{Deserialize, Serialize};
use tracing::info;

use dyad_store::{Table, WriteBatch};
use dyad_types::{DelegationId, IdentityMode, PollId, Timestamp, UserId};

use crate::ballot::Ballot;
use crate::codec::{self, keys, Versioned};
use crate::engine::GovernanceEngine;
use crate::error::GovernanceError;
use crate::spans;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub id: DelegationId,
    pub delegator: UserId,
    pub delegate: UserId,
    /// Both ends act in this mode.
    pub mode: IdentityMode,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Delegation {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// The role a (mode, user) currently plays in the delegation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum DelegationRole {
    Delegator(DelegationId),
    /// Number of active incoming delegations.
    Receiver(u32),
}

fn load_role(
    engine: &GovernanceEngine,
    mode: IdentityMode,
    user: &UserId,
) -> Result<Option<Versioned<DelegationRole>>, GovernanceError> {
    codec::load(engine.store.as_ref(), Table::DelegationRoles, &keys::mode_user(mode, user))
}

fn raw_of<T>(v: &Option<Versioned<T>>) -> Option<&[u8]> {
    v.as_ref().map(|v| v.raw.as_slice())
}

impl GovernanceEngine {
    pub fn delegate(&self, delegator: &UserId, delegate: &UserId, mode: IdentityMode) -> Result<Delegation, GovernanceError> {
        let _span = spans::delegation_span("delegate").entered();
        delegator.validate()?;
        delegate.validate()?;
        if delegator == delegate {
            return Err(GovernanceError::SelfDelegation);
        }
        self.require_verified(delegator, mode)?;
        if !self.identity.is_verified_human(delegate, mode)? {
            return Err(GovernanceError::InvalidInput(format!(
                "delegate is not a verified human in {mode} mode"
            )));
        }

        let mut reserved_id = None;
        self.retry_commit("delegate", || {
            let from_role = load_role(self, mode, delegator)?;
            let to_role = load_role(self, mode, delegate)?;

            match from_role.as_ref().map(|r| r.value) {
                Some(DelegationRole::Delegator(_)) => {
                    return Err(GovernanceError::DelegationConflict(
                        "already delegating in this mode; revoke first".into(),
                    ))
                }
                Some(DelegationRole::Receiver(_)) => {
                    return Err(GovernanceError::DelegationConflict(
                        "identity receives delegations and cannot delegate onward".into(),
                    ))
                }
                None => {}
            }
            let received = match to_role.as_ref().map(|r| r.value) {
                Some(DelegationRole::Delegator(_)) => {
                    return Err(GovernanceError::DelegationConflict(
                        "target delegates onward and cannot receive".into(),
                    ))
                }
                Some(DelegationRole::Receiver(n)) => n,
                None => 0,
            };

            let id = match reserved_id {
                Some(id) => id,
                None => *reserved_id.insert(self.store.next_sequence("delegations")?),
            };
            let record = Delegation {
                id,
                delegator: delegator.clone(),
                delegate: delegate.clone(),
                mode,
                created_at: self.now(),
                revoked_at: None,
            };

            let from_key = keys::mode_user(mode, delegator);
            let to_key = keys::mode_user(mode, delegate);
            let mut batch = WriteBatch::new();
            batch
                .expect(Table::DelegationRoles, &from_key, raw_of(&from_role))
                .expect(Table::DelegationRoles, &to_key, raw_of(&to_role))
                .expect_absent(Table::Delegations, &keys::id(id))
                .put(Table::Delegations, &keys::id(id), &codec::encode(&record)?)
                .put(Table::DelegationOutgoing, &from_key, &codec::encode(&id)?)
                .put(
                    Table::DelegationIncoming,
                    &keys::incoming(mode, delegate, delegator),
                    &codec::encode(delegator)?,
                )
                .put(Table::DelegationRoles, &from_key, &codec::encode(&DelegationRole::Delegator(id))?)
                .put(
                    Table::DelegationRoles,
                    &to_key,
                    &codec::encode(&DelegationRole::Receiver(received + 1))?,
                );
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(delegation = id, mode = %mode, "delegation created");
            Ok(Some(record))
        })
    }

    /// Revoke a delegation. Only the delegator may do this.
    pub fn revoke_delegation(&self, id: DelegationId, caller: &UserId) -> Result<Delegation, GovernanceError> {
        let _span = spans::delegation_span("revoke").entered();
        caller.validate()?;
        self.retry_commit("revoke delegation", || {
            let current: Versioned<Delegation> = codec::load(self.store.as_ref(), Table::Delegations, &keys::id(id))?
                .ok_or(GovernanceError::DelegationNotFound(id))?;
            let record = &current.value;
            if &record.delegator != caller {
                return Err(GovernanceError::NotDelegator);
            }
            if !record.is_active() {
                return Err(GovernanceError::DelegationAlreadyRevoked(id));
            }

            let from_key = keys::mode_user(record.mode, &record.delegator);
            let to_key = keys::mode_user(record.mode, &record.delegate);
            let from_role = load_role(self, record.mode, &record.delegator)?;
            let to_role = load_role(self, record.mode, &record.delegate)?;

            let mut revoked = record.clone();
            revoked.revoked_at = Some(self.now());

            let mut batch = WriteBatch::new();
            batch
                .expect_value(Table::Delegations, &keys::id(id), &current.raw)
                .expect(Table::DelegationRoles, &from_key, raw_of(&from_role))
                .expect(Table::DelegationRoles, &to_key, raw_of(&to_role))
                .put(Table::Delegations, &keys::id(id), &codec::encode(&revoked)?)
                .delete(Table::DelegationOutgoing, &from_key)
                .delete(
                    Table::DelegationIncoming,
                    &keys::incoming(record.mode, &record.delegate, &record.delegator),
                )
                .delete(Table::DelegationRoles, &from_key);
            match to_role.map(|r| r.value) {
                Some(DelegationRole::Receiver(n)) if n > 1 => {
                    batch.put(
                        Table::DelegationRoles,
                        &to_key,
                        &codec::encode(&DelegationRole::Receiver(n - 1))?,
                    );
                }
                _ => {
                    batch.delete(Table::DelegationRoles, &to_key);
                }
            }
            if !self.store.commit(&batch)?.is_committed() {
                return Ok(None);
            }
            info!(delegation = id, "delegation revoked");
            Ok(Some(revoked))
        })
    }

    pub fn get_delegation(&self, id: DelegationId) -> Result<Delegation, GovernanceError> {
        codec::load(self.store.as_ref(), Table::Delegations, &keys::id(id))?
            .map(|v: Versioned<Delegation>| v.value)
            .ok_or(GovernanceError::DelegationNotFound(id))
    }

    /// The active delegation `user` has made in `mode`, if any.
    pub fn active_delegation(&self, user: &UserId, mode: IdentityMode) -> Result<Option<Delegation>, GovernanceError> {
        let Some(id) = codec::load::<DelegationId>(self.store.as_ref(), Table::DelegationOutgoing, &keys::mode_user(mode, user))?
        else {
            return Ok(None);
        };
        self.get_delegation(id.value).map(Some)
    }

    /// Delegators a ballot by `delegate` would carry on `poll` right now.
    ///
    /// A delegator is skipped when they have their own ballot on the poll, or
    /// when a different delegate's ballot already carries them.
    pub(crate) fn carried_delegators(
        &self,
        poll: PollId,
        mode: IdentityMode,
        delegate: &UserId,
    ) -> Result<Vec<UserId>, GovernanceError> {
        let incoming = codec::load_all::<UserId>(
            self.store.as_ref(),
            Table::DelegationIncoming,
            &keys::incoming_prefix(mode, delegate),
        )?;
        let mut carried = Vec::with_capacity(incoming.len());
        for delegator in incoming.into_iter().map(|v| v.value) {
            let key = keys::poll_mode_user(poll, mode, &delegator);
            if self.store.get(Table::Ballots, &key)?.is_some() {
                continue;
            }
            if let Some(carrier) = codec::load::<UserId>(self.store.as_ref(), Table::Carried, &key)? {
                if &carrier.value != delegate {
                    continue;
                }
            }
            carried.push(delegator);
        }
        Ok(carried)
    }
}

/// Guards and writes keeping the `Carried` index in step with a ballot.
///
/// Every delegator in `next` must have no ballot of their own and be carried
/// by nobody else; delegators dropped since `previous` are released.
pub(crate) fn carry_guards(
    batch: &mut WriteBatch,
    ballot: &Ballot,
    previous: Option<&Ballot>,
) -> Result<(), GovernanceError> {
    let carrier = codec::encode(&ballot.voter)?;
    for delegator in &ballot.carried {
        let key = keys::poll_mode_user(ballot.poll_id, ballot.mode, delegator);
        let already = previous.is_some_and(|p| p.carried.contains(delegator));
        batch.expect_absent(Table::Ballots, &key);
        if already {
            batch.expect_value(Table::Carried, &key, &carrier);
        } else {
            batch.expect_absent(Table::Carried, &key);
        }
        batch.put(Table::Carried, &key, &carrier);
    }
    if let Some(previous) = previous {
        for dropped in previous.carried.iter().filter(|d| !ballot.carried.contains(d)) {
            let key = keys::poll_mode_user(ballot.poll_id, ballot.mode, dropped);
            batch
                .expect_value(Table::Carried, &key, &carrier)
                .delete(Table::Carried, &key);
        }
    }
    Ok(())
}
