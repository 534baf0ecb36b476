//! Pre-built [`tracing::Span`] constructors for engine operations.
//!
//! Consistent span names and fields make traces easy to filter. Spans never
//! carry a voter id; ballot-level events log the poll and mode only.

use tracing::{debug_span, info_span, Span};

use dyad_types::PollId;

pub fn create_poll_span(kind: &str) -> Span {
    info_span!("create_poll", kind = %kind)
}

pub fn ballot_span(op: &'static str, poll: PollId) -> Span {
    info_span!("ballot", op, poll = %poll)
}

pub fn delegation_span(op: &'static str) -> Span {
    info_span!("delegation", op)
}

pub fn stake_span(poll: PollId) -> Span {
    info_span!("stake", poll = %poll)
}

pub fn rollback_span(tier: &str, poll: PollId) -> Span {
    info_span!("rollback", tier = %tier, poll = %poll)
}

pub fn sweep_span() -> Span {
    info_span!("sweep")
}

pub fn tally_span(poll: PollId) -> Span {
    debug_span!("tally", poll = %poll)
}
