use std::sync::{Arc, Barrier};

use dyad_store::{CommitOutcome, GovernanceStore, StoreError, Table, WriteBatch, MAX_KEY_LEN};
use dyad_store_lmdb::LmdbEnvironment;

fn open() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), 16 << 20).unwrap();
    (dir, env)
}

#[test]
fn put_get_and_prefix_scan() {
    let (_dir, env) = open();
    let mut batch = WriteBatch::new();
    batch
        .put(Table::Ballots, &[1, 0, b'a'], b"a")
        .put(Table::Ballots, &[1, 1, b'b'], b"b")
        .put(Table::Ballots, &[2, 0, b'c'], b"c");
    assert_eq!(env.commit(&batch).unwrap(), CommitOutcome::Committed);

    assert_eq!(env.get(Table::Ballots, &[1, 0, b'a']).unwrap(), Some(b"a".to_vec()));
    assert_eq!(env.get(Table::Polls, &[1, 0, b'a']).unwrap(), None);

    let scanned = env.scan_prefix(Table::Ballots, &[1]).unwrap();
    assert_eq!(scanned.len(), 2);
    assert_eq!(scanned[0].1, b"a".to_vec());
    assert_eq!(env.scan_prefix(Table::Ballots, &[]).unwrap().len(), 3);
}

#[test]
fn oversized_keys_fail_before_the_transaction() {
    let (_dir, env) = open();
    let long = vec![b'u'; MAX_KEY_LEN + 1];
    let mut batch = WriteBatch::new();
    batch.put(Table::Polls, b"p1", b"open").put(Table::Ballots, &long, b"x");
    let err = env.commit(&batch).unwrap_err();
    assert!(matches!(err, StoreError::KeyTooLarge { table: Table::Ballots, .. }));
    assert_eq!(env.get(Table::Polls, b"p1").unwrap(), None);
    assert!(matches!(env.get(Table::Ballots, &long), Err(StoreError::KeyTooLarge { .. })));

    let exact = vec![b'u'; MAX_KEY_LEN];
    let mut fits = WriteBatch::new();
    fits.put(Table::Ballots, &exact, b"x");
    assert_eq!(env.commit(&fits).unwrap(), CommitOutcome::Committed);
}

#[test]
fn failed_guard_writes_nothing() {
    let (_dir, env) = open();
    let mut seed = WriteBatch::new();
    seed.put(Table::Polls, b"p1", b"open");
    env.commit(&seed).unwrap();

    let mut batch = WriteBatch::new();
    batch
        .expect_value(Table::Polls, b"p1", b"closed")
        .put(Table::Polls, b"p1", b"resolved")
        .put(Table::Snapshots, b"p1", b"snap");
    let outcome = env.commit(&batch).unwrap();
    assert!(matches!(outcome, CommitOutcome::GuardFailed { table: Table::Polls, .. }));
    assert_eq!(env.get(Table::Polls, b"p1").unwrap(), Some(b"open".to_vec()));
    assert_eq!(env.get(Table::Snapshots, b"p1").unwrap(), None);
}

#[test]
fn delete_applies_inside_batch() {
    let (_dir, env) = open();
    let mut seed = WriteBatch::new();
    seed.put(Table::Carried, b"k", b"v");
    env.commit(&seed).unwrap();

    let mut batch = WriteBatch::new();
    batch.expect_value(Table::Carried, b"k", b"v").delete(Table::Carried, b"k");
    assert!(env.commit(&batch).unwrap().is_committed());
    assert_eq!(env.get(Table::Carried, b"k").unwrap(), None);
}

#[test]
fn sequences_are_monotonic_and_independent() {
    let (_dir, env) = open();
    assert_eq!(env.next_sequence("polls").unwrap(), 1);
    assert_eq!(env.next_sequence("polls").unwrap(), 2);
    assert_eq!(env.next_sequence("stakes").unwrap(), 1);
}

#[test]
fn concurrent_insert_if_absent_has_one_winner() {
    let (_dir, env) = open();
    let env = Arc::new(env);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let env = Arc::clone(&env);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let mut batch = WriteBatch::new();
                batch.expect_absent(Table::Draws, b"key").put(Table::Draws, b"key", &[i]);
                env.commit(&batch).unwrap().is_committed()
            })
        })
        .collect();

    let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|w| *w).count();
    assert_eq!(winners, 1);
    assert!(env.get(Table::Draws, b"key").unwrap().is_some());
}

#[test]
fn reopen_preserves_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let env = LmdbEnvironment::open(dir.path(), 16 << 20).unwrap();
        let mut batch = WriteBatch::new();
        batch.put(Table::Whitelist, b"max_vote_changes", b"5");
        env.commit(&batch).unwrap();
    }
    let env = LmdbEnvironment::open(dir.path(), 16 << 20).unwrap();
    assert_eq!(env.get(Table::Whitelist, b"max_vote_changes").unwrap(), Some(b"5".to_vec()));
    assert_eq!(env.schema_version().unwrap(), dyad_store::SCHEMA_VERSION);
}
