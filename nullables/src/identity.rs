//! Nullable identity service.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use dyad_external::{ExternalError, IdentityService};
use dyad_types::{IdentityMode, UserId};

/// In-memory identity registry.
///
/// Users are unverified until [`NullIdentity::verify`] is called.
#[derive(Debug, Default)]
pub struct NullIdentity {
    verified: Mutex<HashSet<(UserId, IdentityMode)>>,
    reputation: Mutex<HashMap<UserId, u64>>,
    unavailable: Mutex<bool>,
}

impl NullIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify both identities of a user, with the given reputation.
    pub fn verify(&self, user: &UserId, reputation: u64) {
        let mut verified = self.verified.lock().unwrap();
        for mode in IdentityMode::ALL {
            verified.insert((user.clone(), mode));
        }
        self.reputation.lock().unwrap().insert(user.clone(), reputation);
    }

    /// Verify a single identity mode.
    pub fn verify_mode(&self, user: &UserId, mode: IdentityMode) {
        self.verified.lock().unwrap().insert((user.clone(), mode));
    }

    pub fn revoke(&self, user: &UserId) {
        self.verified.lock().unwrap().retain(|(u, _)| u != user);
    }

    /// Make every call fail with `Unavailable`.
    pub fn set_unavailable(&self, down: bool) {
        *self.unavailable.lock().unwrap() = down;
    }

    fn check_up(&self) -> Result<(), ExternalError> {
        if *self.unavailable.lock().unwrap() {
            return Err(ExternalError::Unavailable("identity service down".into()));
        }
        Ok(())
    }
}

impl IdentityService for NullIdentity {
    fn is_verified_human(&self, user: &UserId, mode: IdentityMode) -> Result<bool, ExternalError> {
        self.check_up()?;
        Ok(self.verified.lock().unwrap().contains(&(user.clone(), mode)))
    }

    fn verified_user_count(&self) -> Result<u64, ExternalError> {
        self.check_up()?;
        let verified = self.verified.lock().unwrap();
        let humans: HashSet<&UserId> = verified
            .iter()
            .filter(|(_, mode)| *mode == IdentityMode::TrueSelf)
            .map(|(u, _)| u)
            .collect();
        Ok(humans.len() as u64)
    }

    fn reputation(&self, user: &UserId) -> Result<u64, ExternalError> {
        self.check_up()?;
        Ok(self.reputation.lock().unwrap().get(user).copied().unwrap_or(0))
    }
}
