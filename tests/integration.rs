//! Black-box tests against the public `Engine` handle, covering the
//! literal scenarios and invariants this engine is expected to satisfy:
//!
//! - basic put/get/delete round trips and overwrite semantics
//! - rotation under a tiny write-buffer forcing multiple flushes
//! - level-0 compaction triggering once enough table files accumulate
//! - WAL recovery across a process restart, including a corrupted tail
//! - flush/compact_range idempotence with respect to observable reads

use std::time::{Duration, Instant};

use aeternusdb::engine::{Engine, EngineConfig, EngineError, ReadOptions, WriteOptions};
use tempfile::tempdir;

fn wait_for<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

fn get(engine: &Engine, key: &[u8]) -> Option<Vec<u8>> {
    match engine.get(ReadOptions::default(), key) {
        Ok(value) => Some(value),
        Err(EngineError::NotFound(_)) => None,
        Err(err) => panic!("unexpected error: {err}"),
    }
}

/// Scenario 1 from the specification's testable-properties section.
#[test]
fn scenario_basic_put_get() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();

    engine.put(WriteOptions::default(), b"foo", b"bar").unwrap();
    engine.put(WriteOptions::default(), b"hello", b"world").unwrap();

    assert_eq!(get(&engine, b"foo"), Some(b"bar".to_vec()));
    assert_eq!(get(&engine, b"hello"), Some(b"world".to_vec()));
    assert_eq!(get(&engine, b"x"), None);
}

/// Scenario 2: overwrite then delete.
#[test]
fn scenario_overwrite_then_delete() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();

    engine.put(WriteOptions::default(), b"k", b"v1").unwrap();
    engine.put(WriteOptions::default(), b"k", b"v2").unwrap();
    assert_eq!(get(&engine, b"k"), Some(b"v2".to_vec()));

    engine.delete(WriteOptions::default(), b"k").unwrap();
    assert_eq!(get(&engine, b"k"), None);
}

/// Scenario 3: enough distinct keys to force several rotations; every
/// key remains readable afterward, the WAL segments used during the
/// burst are gone, and at least a few level-0 tables were produced.
#[test]
fn scenario_many_keys_force_rotation_and_flush() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        write_buffer_size: 8 * 1024,
        block_size: 1024,
        ..EngineConfig::default()
    };
    let engine = Engine::open(config, dir.path()).unwrap();

    const N: u32 = 2_000;
    for i in 0..N {
        let key = format!("key-{i:06}");
        let value = format!("value-{i:06}-{}", "x".repeat(32));
        engine
            .put(WriteOptions::default(), key.as_bytes(), value.as_bytes())
            .unwrap();
    }

    let all_found = wait_for(
        || {
            (0..N).all(|i| {
                let key = format!("key-{i:06}");
                let expected = format!("value-{i:06}-{}", "x".repeat(32));
                get(&engine, key.as_bytes()) == Some(expected.into_bytes())
            })
        },
        Duration::from_secs(10),
    );
    assert!(all_found, "every written key must remain readable");

    let wal_gone = wait_for(
        || {
            std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .all(|e| !e.file_name().to_string_lossy().starts_with("wal-"))
        },
        Duration::from_secs(10),
    );
    assert!(wal_gone, "flushed WAL segments should be deleted");

    let l0_files = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("L0-"))
        .count();
    assert!(l0_files >= 1, "at least one level-0 table should exist");
}

/// Scenario 5 (condensed): enough writes/rotations to exceed the
/// level-0 compaction trigger eventually produce a level-1 file, with
/// all data remaining readable through both levels.
#[test]
fn scenario_level0_compaction_preserves_reads() {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        write_buffer_size: 2 * 1024,
        block_size: 512,
        ..EngineConfig::default()
    };
    let engine = Engine::open(config, dir.path()).unwrap();

    const N: u32 = 5_000;
    for i in 0..N {
        let key = format!("k{i:06}");
        let value = format!("v{i:06}");
        engine
            .put(WriteOptions::default(), key.as_bytes(), value.as_bytes())
            .unwrap();
    }

    let all_found = wait_for(
        || {
            (0..N).all(|i| {
                let key = format!("k{i:06}");
                let expected = format!("v{i:06}");
                get(&engine, key.as_bytes()) == Some(expected.into_bytes())
            })
        },
        Duration::from_secs(20),
    );
    assert!(all_found, "reads must stay correct across flush and compaction");
}

/// Scenario 6: truncating the last byte of the active WAL before a
/// reopen drops only the trailing partial record; everything written
/// before it survives.
#[test]
fn scenario_wal_truncation_keeps_earlier_records() {
    let dir = tempdir().unwrap();
    let wal_path = {
        let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();
        engine.put(WriteOptions::default(), b"a", b"1").unwrap();
        engine.put(WriteOptions::default(), b"b", b"2").unwrap();
        engine.put(WriteOptions::default(), b"c", b"3").unwrap();
        drop(engine);

        std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().starts_with("wal-"))
            .expect("a WAL segment should remain after an unclean shutdown")
            .path()
    };

    let file = std::fs::OpenOptions::new().write(true).open(&wal_path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - 1).unwrap();
    drop(file);

    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();
    assert_eq!(get(&engine, b"a"), Some(b"1".to_vec()));
    assert_eq!(get(&engine, b"b"), Some(b"2".to_vec()));
}

/// Flush is idempotent with respect to observable reads.
#[test]
fn flush_does_not_change_observable_reads() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();

    engine.put(WriteOptions::default(), b"p", b"1").unwrap();
    engine.put(WriteOptions::default(), b"q", b"2").unwrap();
    let before = (get(&engine, b"p"), get(&engine, b"q"));

    engine.flush().unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let after = (get(&engine, b"p"), get(&engine, b"q"));
    assert_eq!(before, after);
}

/// `compact_range` is best-effort and accepts arbitrary (or absent)
/// bounds without affecting correctness of unrelated keys.
#[test]
fn compact_range_is_advisory_and_preserves_reads() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();

    for i in 0..50u32 {
        let key = format!("m{i:03}");
        engine.put(WriteOptions::default(), key.as_bytes(), b"v").unwrap();
    }
    engine.compact_range(Some(b"m000"), Some(b"m025")).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    for i in 0..50u32 {
        let key = format!("m{i:03}");
        assert_eq!(get(&engine, key.as_bytes()), Some(b"v".to_vec()));
    }
}

/// Reopening an empty, freshly created directory works and produces an
/// empty database.
#[test]
fn open_on_empty_directory_yields_empty_database() {
    let dir = tempdir().unwrap();
    let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();
    assert_eq!(get(&engine, b"anything"), None);
}

/// `error_if_exists` rejects opening over an already-initialized
/// directory.
#[test]
fn error_if_exists_rejects_reopen() {
    let dir = tempdir().unwrap();
    {
        let engine = Engine::open(EngineConfig::default(), dir.path()).unwrap();
        engine.put(WriteOptions::default(), b"a", b"1").unwrap();
    }

    let config = EngineConfig {
        error_if_exists: true,
        ..EngineConfig::default()
    };
    let err = Engine::open(config, dir.path()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

/// `create_if_missing = false` against a nonexistent directory fails
/// instead of silently creating one.
#[test]
fn create_if_missing_false_rejects_nonexistent_dir() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist-yet");
    let config = EngineConfig {
        create_if_missing: false,
        ..EngineConfig::default()
    };
    let err = Engine::open(config, &missing).unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}
