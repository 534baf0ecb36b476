use proptest::prelude::*;

use dyad_types::{IdentityMode, PollId, Timestamp, TokenAmount, UserId};

proptest! {
    /// PollId keys sort in the same order as the ids.
    #[test]
    fn poll_key_order_matches_id_order(a in any::<u64>(), b in any::<u64>()) {
        let ka = PollId::new(a).to_key();
        let kb = PollId::new(b).to_key();
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
        prop_assert_eq!(PollId::from_key(&ka), Some(PollId::new(a)));
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// A symmetric offset never moves a timestamp further than its magnitude.
    #[test]
    fn offset_is_bounded(base in 0u64..u64::MAX / 2, delta in -1_000_000i64..1_000_000i64) {
        let shifted = Timestamp::new(base).offset_by(delta);
        let distance = shifted.as_secs().abs_diff(base);
        prop_assert!(distance <= delta.unsigned_abs());
    }

    /// portion_bps never exceeds the original amount.
    #[test]
    fn portion_never_exceeds_whole(raw in 0u128..u128::MAX / 10_000, bps in 0u32..=10_000) {
        let amount = TokenAmount::new(raw);
        prop_assert!(amount.portion_bps(bps) <= amount);
    }

    /// Mode tags round-trip.
    #[test]
    fn mode_tag_roundtrip(shadow in any::<bool>()) {
        let mode = if shadow { IdentityMode::Shadow } else { IdentityMode::TrueSelf };
        prop_assert_eq!(IdentityMode::from_tag(mode.tag()), Some(mode));
    }

    /// Any id made of visible ASCII within the length limit parses.
    #[test]
    fn visible_ascii_ids_parse(raw in "[a-zA-Z0-9_.-]{1,128}") {
        prop_assert!(UserId::parse(raw).is_ok());
    }

    /// UserId bincode serialization roundtrip.
    #[test]
    fn user_id_bincode_roundtrip(raw in "[a-z0-9]{1,32}") {
        let user = UserId::new(raw);
        let encoded = bincode::serialize(&user).unwrap();
        let decoded: UserId = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, user);
    }
}
