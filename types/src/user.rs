//! Participant identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a raw string was rejected as a user id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("user id is empty")]
    Empty,

    #[error("user id exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("user id contains whitespace or control characters")]
    InvalidCharacters,
}

/// Opaque identifier of a platform participant, issued by the identity service.
///
/// The same id is used for both identity modes; which identity is acting is
/// always carried separately as an [`crate::IdentityMode`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub const MAX_LEN: usize = 128;

    /// Build a user id, validating its shape.
    pub fn parse(raw: impl Into<String>) -> Result<Self, UserIdError> {
        let id = Self(raw.into());
        id.validate()?;
        Ok(id)
    }

    /// Build a user id without validation (trusted input, tests).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the shape of an id built with [`UserId::new`] or deserialized.
    pub fn validate(&self) -> Result<(), UserIdError> {
        if self.0.is_empty() {
            return Err(UserIdError::Empty);
        }
        if self.0.len() > Self::MAX_LEN {
            return Err(UserIdError::TooLong { max: Self::MAX_LEN });
        }
        if self.0.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(UserIdError::InvalidCharacters);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_malformed_ids() {
        assert_eq!(UserId::parse(""), Err(UserIdError::Empty));
        assert_eq!(UserId::parse("a b"), Err(UserIdError::InvalidCharacters));
        assert!(matches!(
            UserId::parse("x".repeat(UserId::MAX_LEN + 1)),
            Err(UserIdError::TooLong { .. })
        ));
    }

    #[test]
    fn unchecked_ids_report_validity() {
        assert!(UserId::new("alice").is_valid());
        assert!(!UserId::new("").is_valid());
        assert_eq!(UserId::new("tab\there").validate(), Err(UserIdError::InvalidCharacters));
    }
}
