//! Archival mirror: records leave the engine without blocking it.

mod common;

use std::sync::Arc;

use common::{test_params, Harness, START};
use dyad_crypto::KEY_LEN;
use dyad_external::ArchiveKind;
use dyad_governance::{
    voter_ref, ArchiveMirror, ArchivePolicy, BallotRequest, Choice, CreatePoll, PollKind, VoterRefKey,
};
use dyad_nullables::NullArchive;
use dyad_types::{IdentityMode, Timestamp, UserId};

fn test_key() -> VoterRefKey {
    VoterRefKey::from_bytes([0x42; KEY_LEN])
}

fn fast_policy(max_attempts: u32) -> ArchivePolicy {
    ArchivePolicy {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    }
}

#[tokio::test]
async fn poll_lifecycle_and_ballots_are_mirrored() {
    let h = Harness::new();
    let sink = Arc::new(NullArchive::new());
    let (handle, task) = ArchiveMirror::spawn(sink.clone(), fast_policy(3), test_key());
    let stats = handle.stats();
    let engine = h.sibling(test_params()).with_archive(handle);

    let creator = h.user("creator");
    let voter = h.user("alice");
    let poll = engine
        .create_poll(CreatePoll {
            kind: PollKind::General,
            title: "Archive me".into(),
            description: String::new(),
            creator,
        })
        .unwrap();
    engine
        .cast_vote(BallotRequest::new(
            poll.id,
            voter.clone(),
            IdentityMode::Shadow,
            Choice::Yes,
        ))
        .unwrap();
    h.clock.set(poll.closes_at.as_secs());
    engine.run_sweeps().unwrap();

    drop(engine);
    task.await.unwrap();

    let records = sink.records();
    let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, [ArchiveKind::PollCreated, ArchiveKind::Ballot, ArchiveKind::PollResolved]);
    assert_eq!(stats.get("archived"), 3);
    assert_eq!(stats.get("dropped"), 0);

    let ballot = &records[1];
    let payload = ballot.payload.to_string();
    assert!(!payload.contains("alice"));
    assert_eq!(ballot.payload["voter_ref"], voter_ref(&test_key(), &voter, IdentityMode::Shadow));
    assert_eq!(ballot.payload["mode"], "shadow");
}

#[tokio::test]
async fn ballot_records_carry_no_true_cast_time() {
    let h = Harness::new();
    let sink = Arc::new(NullArchive::new());
    let (handle, task) = ArchiveMirror::spawn(sink.clone(), fast_policy(3), test_key());
    let engine = h.sibling(test_params()).with_archive(handle);

    let poll = h.general_poll();
    let voter = h.user("alice");
    // Zero entropy draws the largest negative offset.
    h.entropy.set(vec![0]);
    let cast_at = START + 5 * Timestamp::HOUR;
    h.clock.set(cast_at);
    let public = engine
        .cast_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::TrueSelf, Choice::Yes))
        .unwrap();
    h.clock.advance(90);
    let private = engine
        .cast_vote(BallotRequest::new(poll.id, voter.clone(), IdentityMode::Shadow, Choice::No))
        .unwrap();
    drop(engine);
    task.await.unwrap();

    let ballots: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|r| r.kind == ArchiveKind::Ballot)
        .collect();
    assert_eq!(ballots.len(), 2);
    for (record, view) in ballots.iter().zip([&public, &private]) {
        assert_eq!(record.recorded_at, view.displayed_at);
        assert_eq!(record.payload["displayed_at"], view.displayed_at.as_secs());
        let json = record.to_json().unwrap();
        for true_time in [cast_at, cast_at + 90] {
            assert!(!json.contains(&true_time.to_string()));
        }
    }
}

#[tokio::test]
async fn voter_refs_cannot_be_recomputed_from_public_ids() {
    let h = Harness::new();
    let sink = Arc::new(NullArchive::new());
    let (handle, task) = ArchiveMirror::spawn(sink.clone(), fast_policy(3), test_key());
    let engine = h.sibling(test_params()).with_archive(handle);

    let poll = h.general_poll();
    let voter = h.user("alice");
    for (mode, choice) in [(IdentityMode::TrueSelf, Choice::Yes), (IdentityMode::Shadow, Choice::No)] {
        engine
            .cast_vote(BallotRequest::new(poll.id, voter.clone(), mode, choice))
            .unwrap();
    }
    drop(engine);
    task.await.unwrap();

    let refs: Vec<String> = sink
        .records()
        .iter()
        .filter(|r| r.kind == ArchiveKind::Ballot)
        .map(|r| r.payload["voter_ref"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(refs.len(), 2);
    assert_ne!(refs[0], refs[1]);

    // A reader who knows the id but not the key finds neither ballot.
    let outsider = VoterRefKey::from_bytes([0; KEY_LEN]);
    for mode in [IdentityMode::TrueSelf, IdentityMode::Shadow] {
        let guess = voter_ref(&outsider, &UserId::new("alice"), mode);
        assert!(!refs.contains(&guess));
    }
    for record in sink.records() {
        assert!(!record.to_json().unwrap().contains("alice"));
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let sink = Arc::new(NullArchive::fail_times(2));
    let (handle, task) = ArchiveMirror::spawn(sink.clone(), fast_policy(5), test_key());
    let stats = handle.stats();

    let h = Harness::new();
    let engine = h.sibling(test_params()).with_archive(handle);
    let creator = h.user("creator");
    engine
        .create_poll(CreatePoll {
            kind: PollKind::General,
            title: "Retry me".into(),
            description: String::new(),
            creator,
        })
        .unwrap();
    drop(engine);
    task.await.unwrap();

    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.attempts(), 3);
    assert_eq!(stats.get("retried"), 2);
    assert_eq!(stats.get("archived"), 1);
}

#[tokio::test]
async fn exhausted_records_are_dropped_without_touching_the_store() {
    let sink = Arc::new(NullArchive::fail_times(10));
    let (handle, task) = ArchiveMirror::spawn(sink.clone(), fast_policy(2), test_key());
    let stats = handle.stats();

    let h = Harness::new();
    let engine = h.sibling(test_params()).with_archive(handle);
    let creator = h.user("creator");
    let poll = engine
        .create_poll(CreatePoll {
            kind: PollKind::General,
            title: "Lost".into(),
            description: String::new(),
            creator,
        })
        .unwrap();
    drop(engine);
    task.await.unwrap();

    assert!(sink.records().is_empty());
    assert_eq!(sink.attempts(), 2);
    assert_eq!(stats.get("dropped"), 1);
    assert_eq!(h.engine.get_poll(poll.id).unwrap(), poll);
}
