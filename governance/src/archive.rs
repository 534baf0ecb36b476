//! Archival mirror: fire-and-forget copies of polls and ballots.
//!
//! The engine hands records to an [`ArchiveHandle`], which only pushes onto
//! an unbounded channel. A tokio task drains the channel and calls the sink
//! on the blocking pool, retrying transient failures with doubling backoff.
//! A record that exhausts its attempts is dropped and counted; nothing in the
//! primary store is ever touched from here.
//!
//! Ballots leave without a voter id or true cast time: the voter becomes a
//! keyed reference per mode and the only time is the jittered one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dyad_crypto::{blake2b_256_keyed, KEY_LEN};
use dyad_external::{ArchiveKind, ArchiveRecord, ArchiveSink, EntropySource, ExternalError};
use dyad_types::{IdentityMode, UserId};
use dyad_utils::StatsCounter;

use crate::ballot::Ballot;
use crate::error::GovernanceError;

const VOTER_REF_DOMAIN: &[u8] = b"dyad/archive-voter/v1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivePolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 10_000,
        }
    }
}

impl ArchivePolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }
}

/// Secret key behind archive voter references. Never archived or logged.
#[derive(Clone)]
pub struct VoterRefKey([u8; KEY_LEN]);

impl VoterRefKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded key of `KEY_LEN` bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, GovernanceError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| GovernanceError::Config(format!("archive voter key: {e}")))?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|raw: Vec<u8>| {
            GovernanceError::Config(format!("archive voter key must be {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }

    /// A fresh random key. Its references join with no other key's.
    pub fn generate(entropy: &dyn EntropySource) -> Result<Self, GovernanceError> {
        let mut bytes = [0u8; KEY_LEN];
        entropy.fill(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for VoterRefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoterRefKey(..)")
    }
}

/// Pseudonymous reference for a voter in one mode.
///
/// Keyed, so knowing a user id is not enough to find that user's ballots;
/// the mode is hashed in, so True Self and Shadow references never match.
pub fn voter_ref(key: &VoterRefKey, voter: &UserId, mode: IdentityMode) -> String {
    hex::encode(blake2b_256_keyed(&key.0, &[VOTER_REF_DOMAIN, &[mode.tag()], voter.as_str().as_bytes()]))
}

/// Archive form of a ballot version, stamped with its displayed time.
pub fn ballot_record(ballot: &Ballot, key: &VoterRefKey) -> ArchiveRecord {
    let voter = voter_ref(key, &ballot.voter, ballot.mode);
    let payload = json!({
        "poll_id": ballot.poll_id.as_u64(),
        "voter_ref": voter,
        "mode": ballot.mode.as_str(),
        "section": ballot.section,
        "multiplier_bps": ballot.multiplier_bps,
        "choice": ballot.choice.to_string(),
        "effective_weight_bps": ballot.effective_weight_bps,
        "carried_delegators": ballot.carried.len(),
        "displayed_at": ballot.displayed_at.as_secs(),
        "change_count": ballot.change_count,
        "reasoning": ballot.reasoning,
    });
    ArchiveRecord::new(
        ArchiveKind::Ballot,
        format!("{}/{}/{}", ballot.poll_id, voter, ballot.change_count),
        payload,
        ballot.displayed_at,
    )
}

/// Producer side of the mirror. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct ArchiveHandle {
    tx: mpsc::UnboundedSender<ArchiveRecord>,
    stats: Arc<StatsCounter>,
    key: Arc<VoterRefKey>,
}

impl ArchiveHandle {
    pub fn submit(&self, record: ArchiveRecord) {
        self.stats.increment("queued");
        if self.tx.send(record).is_err() {
            self.stats.increment("dropped");
            warn!("archive mirror has stopped; record dropped");
        }
    }

    pub(crate) fn voter_key(&self) -> &VoterRefKey {
        &self.key
    }

    /// Shared counters; they outlive the handle.
    pub fn stats(&self) -> Arc<StatsCounter> {
        Arc::clone(&self.stats)
    }
}

pub struct ArchiveMirror;

impl ArchiveMirror {
    /// Start the mirror task on the current tokio runtime.
    ///
    /// The task ends once every handle is dropped and the queue is drained.
    pub fn spawn(
        sink: Arc<dyn ArchiveSink>,
        policy: ArchivePolicy,
        key: VoterRefKey,
    ) -> (ArchiveHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ArchiveRecord>();
        let stats = Arc::new(StatsCounter::new(&["queued", "archived", "retried", "dropped"]));
        let task_stats = Arc::clone(&stats);

        let task = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                deliver(&sink, &policy, &task_stats, record).await;
            }
            info!(stats = %task_stats.render(), "archive mirror stopped");
        });

        let handle = ArchiveHandle {
            tx,
            stats,
            key: Arc::new(key),
        };
        (handle, task)
    }
}

async fn deliver(sink: &Arc<dyn ArchiveSink>, policy: &ArchivePolicy, stats: &StatsCounter, record: ArchiveRecord) {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let call_sink = Arc::clone(sink);
        let call_record = record.clone();
        let result = tokio::task::spawn_blocking(move || call_sink.archive(&call_record))
            .await
            .unwrap_or_else(|e| Err(ExternalError::Unavailable(format!("archive task failed: {e}"))));

        match result {
            Ok(()) => {
                stats.increment("archived");
                debug!(key = %record.key, attempt, "archived");
                return;
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                stats.increment("retried");
                let delay = policy.backoff(attempt);
                debug!(key = %record.key, attempt, delay_ms = delay.as_millis() as u64, error = %e, "archive retry");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                stats.increment("dropped");
                warn!(key = %record.key, attempt, error = %e, "archive record dropped");
                return;
            }
        }
    }
}
