//! Casting and changing ballots.

mod common;

use std::thread;

use common::{test_params, Harness};
use dyad_governance::{
    BallotRequest, Choice, CreatePoll, ErrorKind, GovernanceError, Outcome, PollKind, RollbackRequest, StakeRequest,
    Tally,
};
use dyad_store::Table;
use dyad_types::{GovernanceParams, IdentityMode, Timestamp, TokenAmount, UserId, UserIdError};

#[test]
fn each_mode_votes_independently() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");

    let t = h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);
    let s = h.vote(poll.id, &voter, IdentityMode::Shadow, Choice::No);
    assert_eq!(t.effective_weight_bps, 10_000);
    assert_eq!(s.choice, Choice::No);

    let tally: Tally = dyad_governance::PollInspector::new(h.store.clone()).tally(poll.id).unwrap();
    assert_eq!(tally.true_self.yes_bps, 10_000);
    assert_eq!(tally.shadow.no_bps, 10_000);
    // One human behind both ballots.
    assert_eq!(tally.participants, 1);
}

#[test]
fn second_cast_is_already_voted() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");
    h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);

    let err = h
        .engine
        .cast_vote(BallotRequest::new(poll.id, voter, IdentityMode::TrueSelf, Choice::No))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::AlreadyVoted(id) if id == poll.id));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn change_without_ballot_is_not_found() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");
    let err = h
        .engine
        .change_vote(BallotRequest::new(poll.id, voter, IdentityMode::Shadow, Choice::No))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::BallotNotFound(_)));
}

#[test]
fn changes_are_bounded() {
    let h = Harness::with_params(GovernanceParams {
        max_vote_changes: 2,
        ..test_params()
    });
    let poll = h.general_poll();
    let voter = h.user("alice");
    h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);

    let change = |choice| {
        h.engine
            .change_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::TrueSelf, choice))
    };
    assert_eq!(change(Choice::No).unwrap().change_count, 1);
    assert_eq!(change(Choice::Abstain).unwrap().change_count, 2);
    let err = change(Choice::Yes).unwrap_err();
    assert!(matches!(err, GovernanceError::ChangeLimitExceeded { max: 2 }));

    let ballot = h
        .engine
        .get_ballot(poll.id, &voter, IdentityMode::TrueSelf, &voter)
        .unwrap()
        .unwrap();
    assert_eq!(ballot.choice, Choice::Abstain);
}

#[test]
fn ballots_are_readable_only_by_their_voter() {
    let h = Harness::new();
    let poll = h.general_poll();
    let alice = h.user("alice");
    let mallory = h.user("mallory");
    h.vote(poll.id, &alice, IdentityMode::TrueSelf, Choice::Yes);
    h.vote(poll.id, &alice, IdentityMode::Shadow, Choice::No);

    for mode in [IdentityMode::TrueSelf, IdentityMode::Shadow] {
        let err = h.engine.get_ballot(poll.id, &alice, mode, &mallory).unwrap_err();
        assert!(matches!(err, GovernanceError::NotBallotOwner));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    let own = h
        .engine
        .get_ballot(poll.id, &alice, IdentityMode::Shadow, &alice)
        .unwrap()
        .unwrap();
    assert_eq!(own.choice, Choice::No);
    let json = serde_json::to_string(&own).unwrap();
    assert!(!json.contains("alice"));
}

#[test]
fn change_keeps_the_section_draw() {
    let h = Harness::with_params(GovernanceParams {
        multiplier_min_bps: 7_000,
        multiplier_max_bps: 15_000,
        ..test_params()
    });
    let poll = h.general_poll();
    let voter = h.user("alice");
    let first = h.vote(poll.id, &voter, IdentityMode::Shadow, Choice::Yes);
    let changed = h
        .engine
        .change_vote(BallotRequest::new(poll.id, voter, IdentityMode::Shadow, Choice::No))
        .unwrap();
    assert_eq!(first.section, changed.section);
    assert_eq!(first.multiplier_bps, changed.multiplier_bps);
    assert!((7_000..=15_000).contains(&changed.multiplier_bps));
}

#[test]
fn unverified_voter_is_refused() {
    let h = Harness::new();
    let poll = h.general_poll();
    let ghost = UserId::new("ghost");
    let err = h
        .engine
        .cast_vote(BallotRequest::new(poll.id, ghost.clone(), IdentityMode::TrueSelf, Choice::Yes))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::NotVerified(IdentityMode::TrueSelf)));

    // Verified for one mode only.
    h.identity.verify_mode(&ghost, IdentityMode::Shadow);
    assert!(h
        .engine
        .cast_vote(BallotRequest::new(poll.id, ghost, IdentityMode::Shadow, Choice::Yes))
        .is_ok());
}

#[test]
fn ballots_after_the_window_are_refused() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");
    h.clock.set(poll.closes_at.as_secs());
    let err = h
        .engine
        .cast_vote(BallotRequest::new(poll.id, voter, IdentityMode::TrueSelf, Choice::Yes))
        .unwrap_err();
    assert!(matches!(err, GovernanceError::VotingClosed));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn reasoning_length_is_checked() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");
    let long = "x".repeat(h.engine.base_params().max_reasoning_len + 1);
    let err = h
        .engine
        .cast_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::TrueSelf, Choice::Yes).with_reasoning(long))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let view = h
        .engine
        .cast_vote(
            BallotRequest::new(poll.id, voter, IdentityMode::TrueSelf, Choice::Yes).with_reasoning("because"),
        )
        .unwrap();
    assert_eq!(view.reasoning.as_deref(), Some("because"));
}

#[test]
fn displayed_time_is_jittered_inside_the_window() {
    let h = Harness::new();
    let poll = h.general_poll();
    let max = h.engine.base_params().vote_jitter_max_secs;
    h.clock.advance(2 * Timestamp::DAY);
    let now = h.clock_now();

    for (i, pattern) in [[0u8; 8], [0xff; 8], [0x13; 8], [0x80, 0, 0, 0, 0, 0, 0, 1]].into_iter().enumerate() {
        h.entropy.set(pattern.to_vec());
        let voter = h.user(&format!("v{i}"));
        let view = h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);
        assert!(view.displayed_at >= poll.opens_at && view.displayed_at <= poll.closes_at);
        let delta = view.displayed_at.as_secs().abs_diff(now.as_secs());
        assert!(delta <= max, "offset {delta} exceeds {max}");
    }
}

#[test]
fn jitter_is_clamped_to_poll_open() {
    let h = Harness::new();
    let poll = h.general_poll();
    h.entropy.set(vec![0; 8]);
    let voter = h.user("early");
    // Offset of exactly -max lands before opens_at.
    let view = h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);
    assert_eq!(view.displayed_at, poll.opens_at);
}

#[test]
fn unvalidated_jitter_is_capped_at_a_week() {
    let h = Harness::with_params(GovernanceParams {
        vote_jitter_max_secs: u64::MAX,
        ..test_params()
    });
    let poll = h.general_poll();
    h.clock.advance(2 * Timestamp::DAY);
    let now = h.clock_now();

    for (i, pattern) in [[0xff; 8], [0x80, 0, 0, 0, 0, 0, 0, 1], [0x7f; 8]].into_iter().enumerate() {
        h.entropy.set(pattern.to_vec());
        let voter = h.user(&format!("w{i}"));
        let view = h.vote(poll.id, &voter, IdentityMode::TrueSelf, Choice::Yes);
        assert!(view.displayed_at >= poll.opens_at && view.displayed_at <= poll.closes_at);
        assert!(view.displayed_at.as_secs().abs_diff(now.as_secs()) <= GovernanceParams::MAX_VOTE_JITTER_SECS);
    }
}

#[test]
fn concurrent_casts_for_one_identity_record_exactly_one() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voter = h.user("alice");

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = &h.engine;
                let voter = voter.clone();
                let choice = if i % 2 == 0 { Choice::Yes } else { Choice::No };
                s.spawn(move || engine.cast_vote(BallotRequest::new(poll.id, voter, IdentityMode::TrueSelf, choice)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ok = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, GovernanceError::AlreadyVoted(_))));
}

#[test]
fn concurrent_voters_all_count() {
    let h = Harness::new();
    let poll = h.general_poll();
    let voters = h.users("member", 16);

    thread::scope(|s| {
        for voter in &voters {
            let engine = &h.engine;
            s.spawn(move || {
                engine
                    .cast_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::Shadow, Choice::Yes))
                    .unwrap();
            });
        }
    });

    let tally = dyad_governance::PollInspector::new(h.store.clone()).tally(poll.id).unwrap();
    assert_eq!(tally.shadow.ballots, 16);
    assert_eq!(tally.shadow.yes_bps, 16 * 10_000);
}

#[test]
fn malformed_user_ids_are_rejected_before_any_write() {
    let h = Harness::new();
    let poll = h.general_poll();
    let alice = h.user("alice");
    let oversized = UserId::new("x".repeat(500));
    let bad = [UserId::new(""), UserId::new("al ice"), oversized.clone()];

    for voter in &bad {
        let err = h
            .engine
            .cast_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::TrueSelf, Choice::Yes))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidUserId(_)), "{voter:?}: {err}");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h.engine.delegate(&alice, voter, IdentityMode::Shadow).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidUserId(_)));

        let err = h
            .engine
            .stake(StakeRequest {
                poll_id: poll.id,
                user: voter.clone(),
                mode: IdentityMode::TrueSelf,
                predicted: Outcome::Passed,
                amount: TokenAmount::new(10),
            })
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidUserId(_)));

        let err = h
            .engine
            .initiate_rollback(RollbackRequest::Petition {
                poll_id: poll.id,
                signer: voter.clone(),
            })
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidUserId(_)));
    }

    let err = h
        .engine
        .create_poll(CreatePoll {
            kind: PollKind::General,
            title: "Who am I".into(),
            description: String::new(),
            creator: oversized,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::InvalidUserId(UserIdError::TooLong { max: UserId::MAX_LEN })
    ));

    assert!(h.store.is_empty(Table::Ballots));
    assert!(h.store.is_empty(Table::Delegations));
    assert!(h.store.is_empty(Table::Stakes));
}
