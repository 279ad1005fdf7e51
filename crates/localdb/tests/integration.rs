//! Integration tests: local documents and info records over an on-disk engine.
//!
//! These go through `LocalDatabase` end to end, including WAL replay on
//! reopen and concurrent writers racing on the same document.

use std::sync::{Arc, Barrier};

use localdb::{Config, LocalDatabase, LocalError, RevisionId, SyncMode};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn test_db() -> (LocalDatabase, TempDir) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
    (db, dir)
}

fn rev_str(rev: &RevisionId) -> String {
    rev.to_string()
}

// ---------------------------------------------------------------------------
// MVCC protocol
// ---------------------------------------------------------------------------

#[test]
fn test_checkpoint_document_lifecycle() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();

    let r1 = docs.put("chk1", b"v1", None, true).unwrap();
    assert_eq!(r1.generation(), 1);

    let r2 = docs.put("chk1", b"v2", Some(&rev_str(&r1)), true).unwrap();
    assert_eq!(r2.generation(), 2);

    let stale = docs.put("chk1", b"v3", Some(&rev_str(&r1)), true).unwrap_err();
    assert!(stale.is_conflict());

    let r3 = docs.delete("chk1", Some(&rev_str(&r2)), true).unwrap().unwrap();
    assert_eq!(r3.generation(), 3);
    assert!(docs.get("chk1", None).unwrap().is_none());

    let r4 = docs.put("chk1", b"v4", Some(&rev_str(&r3)), true).unwrap();
    assert_eq!(r4.generation(), 4);
    assert_eq!(docs.get("chk1", None).unwrap().unwrap().body, b"v4");
}

#[test]
fn test_put_succeeds_only_with_latest_revision() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();

    let mut issued: Vec<RevisionId> = Vec::new();
    let mut latest: Option<RevisionId> = None;

    for round in 0..20u32 {
        // Every third round replays an older revision, which must conflict
        let candidate = if round % 3 == 2 && issued.len() >= 2 {
            Some(issued[issued.len() - 2].clone())
        } else {
            latest.clone()
        };
        let candidate_str = candidate.as_ref().map(rev_str);
        let result = docs.put("doc", round.to_string().as_bytes(), candidate_str.as_deref(), true);

        if candidate == latest {
            let rev = result.unwrap();
            assert_eq!(rev.generation(), latest.as_ref().map_or(0, |r| r.generation()) + 1);
            issued.push(rev.clone());
            latest = Some(rev);
        } else {
            assert!(result.unwrap_err().is_conflict());
        }
    }
}

#[test]
fn test_bypass_advances_generation() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();

    let r1 = docs.put("admin", b"a", None, true).unwrap();
    let r2 = docs.put("admin", b"b", Some("99-bogus"), false).unwrap();
    assert_eq!(r2.generation(), r1.generation() + 1);

    let r3 = docs.delete("admin", None, false).unwrap().unwrap();
    assert_eq!(r3.generation(), 3);
    assert_eq!(docs.delete("admin", None, false).unwrap(), None);

    let r4 = docs.put("admin", b"c", None, false).unwrap();
    assert_eq!(r4.generation(), 4);
}

#[test]
fn test_get_revision_assertions() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();

    let r1 = docs.put("d", b"x", None, true).unwrap();
    let r2 = docs.put("d", b"y", Some(&rev_str(&r1)), true).unwrap();

    assert_eq!(docs.get("d", Some(&rev_str(&r2))).unwrap().unwrap().body, b"y");
    match docs.get("d", Some(&rev_str(&r1))) {
        Err(LocalError::RevisionMismatch { requested, current, .. }) => {
            assert_eq!(requested, rev_str(&r1));
            assert_eq!(current, rev_str(&r2));
        }
        other => panic!("expected mismatch, got {:?}", other),
    }

    let tomb = docs.delete("d", Some(&rev_str(&r2)), true).unwrap().unwrap();
    assert!(matches!(docs.get("d", Some(&rev_str(&tomb))), Err(LocalError::NotFound { .. })));
}

// ---------------------------------------------------------------------------
// Info records
// ---------------------------------------------------------------------------

#[test]
fn test_info_independent_of_local_docs() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();
    let info = db.info();

    info.set("shared", "info-value").unwrap();
    assert!(docs.get("shared", None).unwrap().is_none());

    let rev = docs.put("shared", b"doc-value", None, true).unwrap();
    assert_eq!(info.get("shared").unwrap().as_deref(), Some("info-value"));

    info.set("shared", "changed").unwrap();
    let doc = docs.get("shared", None).unwrap().unwrap();
    assert_eq!(doc.rev_id, rev);
    assert_eq!(doc.body, b"doc-value");

    docs.delete("shared", Some(&rev_str(&rev)), true).unwrap();
    assert_eq!(info.get("shared").unwrap().as_deref(), Some("changed"));
    assert_eq!(info.keys().unwrap(), vec!["shared".to_string()]);
    assert!(docs.doc_ids().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Durability
// ---------------------------------------------------------------------------

#[test]
fn test_state_survives_reopen() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let (live_rev, tomb_rev) = {
        let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
        let docs = db.local_docs();
        let live = docs.put("live", b"kept", None, true).unwrap();
        let gone = docs.put("gone", b"temp", None, true).unwrap();
        let tomb = docs.delete("gone", Some(&rev_str(&gone)), true).unwrap().unwrap();
        db.info().set("version", "3").unwrap();
        (live, tomb)
    };

    let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
    let docs = db.local_docs();
    assert_eq!(docs.get("live", None).unwrap().unwrap().rev_id, live_rev);
    assert!(docs.get("gone", None).unwrap().is_none());
    assert_eq!(docs.current_revision("gone").unwrap(), Some(tomb_rev.clone()));
    assert_eq!(db.info().get("version").unwrap().as_deref(), Some("3"));

    // Generation continues across the restart
    let next = docs.put("gone", b"back", Some(&rev_str(&tomb_rev)), true).unwrap();
    assert_eq!(next.generation(), tomb_rev.generation() + 1);
}

#[test]
fn test_checkpoint_keeps_tombstones() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let tomb = {
        let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
        let docs = db.local_docs();
        let mut rev = docs.put("chk", b"0", None, true).unwrap();
        for i in 1..10u32 {
            rev = docs.put("chk", i.to_string().as_bytes(), Some(&rev_str(&rev)), true).unwrap();
        }
        let tomb = docs.delete("chk", Some(&rev_str(&rev)), true).unwrap().unwrap();
        assert_eq!(db.checkpoint().unwrap(), 1);
        tomb
    };

    let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
    assert_eq!(db.local_docs().current_revision("chk").unwrap(), Some(tomb));
}

#[test]
fn test_batched_sync_mode() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.sync_mode = SyncMode::Batched;
    {
        let db = LocalDatabase::open(dir.path(), config.clone()).unwrap();
        db.local_docs().put("b", b"1", None, true).unwrap();
        db.sync().unwrap();
    }
    let db = LocalDatabase::open(dir.path(), config).unwrap();
    assert!(db.local_docs().get("b", None).unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_racing_writers_single_winner() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();
    let base = docs.put("race", b"base", None, true).unwrap();
    let base = rev_str(&base);

    const WRITERS: usize = 8;
    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let docs = docs.clone();
            let barrier = Arc::clone(&barrier);
            let base = base.clone();
            std::thread::spawn(move || {
                barrier.wait();
                docs.put("race", format!("writer-{}", i).as_bytes(), Some(&base), true)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| r.as_ref().unwrap_err().is_conflict()));

    let doc = docs.get("race", None).unwrap().unwrap();
    assert_eq!(&doc.rev_id, winners[0]);
    assert_eq!(doc.rev_id.generation(), 2);
}

#[test]
fn test_retry_loop_counts_every_increment() {
    let (db, _dir) = test_db();
    let docs = db.local_docs();
    docs.put("counter", b"0", None, true).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let docs = docs.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    loop {
                        let doc = docs.get("counter", None).unwrap().unwrap();
                        let n: u64 = std::str::from_utf8(&doc.body).unwrap().parse().unwrap();
                        let rev = doc.rev_id.to_string();
                        match docs.put("counter", (n + 1).to_string().as_bytes(), Some(&rev), true) {
                            Ok(_) => break,
                            Err(e) if e.is_conflict() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles { h.join().unwrap(); }

    let doc = docs.get("counter", None).unwrap().unwrap();
    assert_eq!(doc.body, b"100");
    assert_eq!(doc.rev_id.generation(), 101);
}
