//! Records shipped to the permanent archive.

use serde::{Deserialize, Serialize};

use dyad_types::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    PollCreated,
    PollResolved,
    PollRolledBack,
    Ballot,
}

/// One archived fact.
///
/// `key` identifies the record for de-duplication on the archive side
/// (a ballot version is keyed by poll, voter reference and change count).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub kind: ArchiveKind,
    pub key: String,
    pub payload: serde_json::Value,
    pub recorded_at: Timestamp,
}

impl ArchiveRecord {
    pub fn new(
        kind: ArchiveKind,
        key: impl Into<String>,
        payload: serde_json::Value,
        recorded_at: Timestamp,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            payload,
            recorded_at,
        }
    }

    /// Serialized form sent over the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
