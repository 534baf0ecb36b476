//! Constitutional amendments.

use serde::{Deserialize, Serialize};

use dyad_types::Timestamp;

use crate::article::ProtectedRule;

/// What it takes to amend an article.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentRequirements {
    pub founder_approval: bool,
    /// At least 90 % approval among decisive votes.
    pub supermajority_90: bool,
    pub min_discussion_days: u32,
}

impl AmendmentRequirements {
    pub const SUPERMAJORITY_90_BPS: u32 = 9_000;

    /// Requirements of every genesis article.
    pub fn genesis() -> Self {
        Self {
            founder_approval: true,
            supermajority_90: true,
            min_discussion_days: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentChange {
    Replace {
        title: String,
        text: String,
        rules: Vec<ProtectedRule>,
    },
    Repeal,
}

/// An approved amendment, ready to apply to one article.
///
/// The vote itself happens elsewhere; the amendment carries its result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub article_number: u32,
    pub change: AmendmentChange,
    pub founder_approved: bool,
    pub approval_bps: u32,
    pub discussion_opened_at: Timestamp,
}
