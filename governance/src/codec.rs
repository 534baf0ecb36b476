//! Record encoding and key layout.
//!
//! Records are bincode-encoded. Keys start with fixed-width big-endian
//! components so prefix scans return rows grouped and ordered; a trailing
//! user id needs no length prefix because nothing follows it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use dyad_store::{GovernanceStore, Table};
use dyad_types::{IdentityMode, PollId, UserId};

use crate::error::GovernanceError;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GovernanceError> {
    bincode::serialize(value).map_err(|e| GovernanceError::Codec(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GovernanceError> {
    bincode::deserialize(bytes).map_err(|e| GovernanceError::Codec(e.to_string()))
}

/// A decoded record together with the exact bytes it was read from, so a
/// later commit can guard on "unchanged since I read it".
#[derive(Clone, Debug)]
pub(crate) struct Versioned<T> {
    pub value: T,
    pub raw: Vec<u8>,
}

pub(crate) fn load<T: DeserializeOwned>(
    store: &dyn GovernanceStore,
    table: Table,
    key: &[u8],
) -> Result<Option<Versioned<T>>, GovernanceError> {
    match store.get(table, key)? {
        Some(raw) => Ok(Some(Versioned {
            value: decode(&raw)?,
            raw,
        })),
        None => Ok(None),
    }
}

pub(crate) fn load_all<T: DeserializeOwned>(
    store: &dyn GovernanceStore,
    table: Table,
    prefix: &[u8],
) -> Result<Vec<Versioned<T>>, GovernanceError> {
    store
        .scan_prefix(table, prefix)?
        .into_iter()
        .map(|(_, raw)| {
            Ok(Versioned {
                value: decode(&raw)?,
                raw,
            })
        })
        .collect()
}

pub(crate) mod keys {
    use super::*;

    pub const CONSTITUTION: &[u8] = b"document";
    pub const FOUNDER: &[u8] = b"founder";

    pub fn poll(id: PollId) -> Vec<u8> {
        id.to_key().to_vec()
    }

    /// Meta row present exactly while a poll is open. Ballots and stakes
    /// guard on it instead of the poll record, so they never contend with
    /// each other but always lose to a close or withdrawal.
    pub fn open_gate(id: PollId) -> Vec<u8> {
        let mut key = b"open-gate:".to_vec();
        key.extend_from_slice(&id.to_key());
        key
    }

    /// (poll, mode, voter): ballots, section draws and carried delegators.
    pub fn poll_mode_user(poll: PollId, mode: IdentityMode, user: &UserId) -> Vec<u8> {
        let mut key = Vec::with_capacity(9 + user.as_str().len());
        key.extend_from_slice(&poll.to_key());
        key.push(mode.tag());
        key.extend_from_slice(user.as_str().as_bytes());
        key
    }

    pub fn poll_mode(poll: PollId, mode: IdentityMode) -> Vec<u8> {
        let mut key = poll.to_key().to_vec();
        key.push(mode.tag());
        key
    }

    pub fn mode_user(mode: IdentityMode, user: &UserId) -> Vec<u8> {
        let mut key = vec![mode.tag()];
        key.extend_from_slice(user.as_str().as_bytes());
        key
    }

    /// Prefix of a delegate's incoming delegations. The delegate id is
    /// length-prefixed because the delegator id follows it.
    pub fn incoming_prefix(mode: IdentityMode, delegate: &UserId) -> Vec<u8> {
        let id = delegate.as_str().as_bytes();
        let mut key = vec![mode.tag()];
        key.extend_from_slice(&(id.len() as u16).to_be_bytes());
        key.extend_from_slice(id);
        key
    }

    pub fn incoming(mode: IdentityMode, delegate: &UserId, delegator: &UserId) -> Vec<u8> {
        let mut key = incoming_prefix(mode, delegate);
        key.extend_from_slice(delegator.as_str().as_bytes());
        key
    }

    pub fn id(id: u64) -> Vec<u8> {
        id.to_be_bytes().to_vec()
    }

    pub fn poll_id_pair(poll: PollId, id: u64) -> Vec<u8> {
        let mut key = poll.to_key().to_vec();
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    pub fn poll_user(poll: PollId, user: &UserId) -> Vec<u8> {
        let mut key = poll.to_key().to_vec();
        key.extend_from_slice(user.as_str().as_bytes());
        key
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use dyad_types::{IdentityMode, PollId, UserId};

    #[test]
    fn incoming_keys_do_not_collide_across_delegates() {
        let ab_c = keys::incoming(IdentityMode::TrueSelf, &UserId::new("ab"), &UserId::new("c"));
        let a_bc = keys::incoming(IdentityMode::TrueSelf, &UserId::new("a"), &UserId::new("bc"));
        assert_ne!(ab_c, a_bc);
        let prefix = keys::incoming_prefix(IdentityMode::TrueSelf, &UserId::new("a"));
        assert!(!ab_c.starts_with(&prefix));
    }

    #[test]
    fn ballot_keys_group_by_poll_then_mode() {
        let p = PollId::new(7);
        let k = keys::poll_mode_user(p, IdentityMode::Shadow, &UserId::new("u"));
        assert!(k.starts_with(&keys::poll(p)));
        assert!(k.starts_with(&keys::poll_mode(p, IdentityMode::Shadow)));
        assert!(!k.starts_with(&keys::poll_mode(p, IdentityMode::TrueSelf)));
    }
}
