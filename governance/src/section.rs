//! Section assignment.
//!
//! Every (poll, voter, mode) is placed in one of seven sections, each with a
//! voting-weight multiplier. The draw is a pure function of the key: one
//! slice of a Blake2b digest picks the section and an independent slice maps
//! uniformly onto the multiplier range. The first ballot persists the draw;
//! later ballots read it back and never redraw.

use serde::{Deserialize, Serialize};

use dyad_crypto::{blake2b_256_multi, hash_slice_u64};
use dyad_store::{GovernanceStore, Table, WriteBatch};
use dyad_types::{IdentityMode, PollId, UserId};

use crate::codec::{self, keys};
use crate::error::GovernanceError;

pub const SECTION_COUNT: u64 = 7;

const DRAW_DOMAIN: &[u8] = b"dyad/section-draw/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraw {
    /// 0..=6
    pub section: u8,
    pub multiplier_bps: u32,
}

/// Derive the draw for a key. `min_bps..=max_bps` is the multiplier range.
pub fn draw_section(
    poll: PollId,
    voter: &UserId,
    mode: IdentityMode,
    min_bps: u32,
    max_bps: u32,
) -> SectionDraw {
    let voter_bytes = voter.as_str().as_bytes();
    let digest = blake2b_256_multi(&[
        DRAW_DOMAIN,
        &poll.to_key(),
        &[mode.tag()],
        &(voter_bytes.len() as u32).to_be_bytes(),
        voter_bytes,
    ]);

    let section = (hash_slice_u64(&digest, 0) % SECTION_COUNT) as u8;

    let (lo, hi) = if min_bps <= max_bps { (min_bps, max_bps) } else { (max_bps, min_bps) };
    let span = (hi - lo) as u128 + 1;
    let offset = ((hash_slice_u64(&digest, 1) as u128 * span) >> 64) as u32;

    SectionDraw {
        section,
        multiplier_bps: lo + offset,
    }
}

/// Read the persisted draw for a key, persisting a fresh one if absent.
///
/// Insert-if-absent: when several first ballots race, exactly one draw is
/// stored and every competitor returns that stored value.
pub(crate) fn ensure_draw(
    store: &dyn GovernanceStore,
    poll: PollId,
    voter: &UserId,
    mode: IdentityMode,
    min_bps: u32,
    max_bps: u32,
) -> Result<SectionDraw, GovernanceError> {
    let key = keys::poll_mode_user(poll, mode, voter);
    if let Some(existing) = codec::load::<SectionDraw>(store, Table::Draws, &key)? {
        return Ok(existing.value);
    }

    let fresh = draw_section(poll, voter, mode, min_bps, max_bps);
    let mut batch = WriteBatch::new();
    batch
        .expect_absent(Table::Draws, &key)
        .put(Table::Draws, &key, &codec::encode(&fresh)?);
    if store.commit(&batch)?.is_committed() {
        return Ok(fresh);
    }

    codec::load::<SectionDraw>(store, Table::Draws, &key)?
        .map(|v| v.value)
        .ok_or(GovernanceError::Contended("section draw"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_is_deterministic_and_in_range() {
        let voter = UserId::new("alice");
        let a = draw_section(PollId::new(1), &voter, IdentityMode::TrueSelf, 7_000, 15_000);
        let b = draw_section(PollId::new(1), &voter, IdentityMode::TrueSelf, 7_000, 15_000);
        assert_eq!(a, b);
        assert!(a.section < 7);
        assert!((7_000..=15_000).contains(&a.multiplier_bps));
    }

    #[test]
    fn modes_draw_independently() {
        let voter = UserId::new("alice");
        let draws: Vec<_> = (1..50)
            .map(|p| {
                (
                    draw_section(PollId::new(p), &voter, IdentityMode::TrueSelf, 7_000, 15_000),
                    draw_section(PollId::new(p), &voter, IdentityMode::Shadow, 7_000, 15_000),
                )
            })
            .collect();
        assert!(draws.iter().any(|(t, s)| t != s));
    }

    #[test]
    fn degenerate_range_yields_fixed_multiplier() {
        let d = draw_section(PollId::new(3), &UserId::new("bob"), IdentityMode::Shadow, 10_000, 10_000);
        assert_eq!(d.multiplier_bps, 10_000);
    }

    #[test]
    fn ensure_draw_keeps_first_value() {
        let store = dyad_nullables::NullStore::new();
        let voter = UserId::new("carol");
        let first = ensure_draw(&store, PollId::new(9), &voter, IdentityMode::TrueSelf, 7_000, 15_000).unwrap();
        // A later range change must not redraw an existing key.
        let again = ensure_draw(&store, PollId::new(9), &voter, IdentityMode::TrueSelf, 10_000, 10_000).unwrap();
        assert_eq!(first, again);
    }
}
