//! The two voting identities every participant holds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of a participant's identities is acting.
///
/// The True Self is public; the Shadow is pseudonymous. Each may cast one
/// ballot per poll, and nothing the engine exposes may pair the two.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    TrueSelf,
    Shadow,
}

impl IdentityMode {
    pub const ALL: [IdentityMode; 2] = [IdentityMode::TrueSelf, IdentityMode::Shadow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrueSelf => "true_self",
            Self::Shadow => "shadow",
        }
    }

    /// Single-byte tag used in storage keys and hash domains.
    pub fn tag(&self) -> u8 {
        match self {
            Self::TrueSelf => 0,
            Self::Shadow => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::TrueSelf),
            1 => Some(Self::Shadow),
            _ => None,
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
