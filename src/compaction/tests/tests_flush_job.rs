use std::sync::Arc;

use tempfile::tempdir;

use crate::compaction::build_flush_job;
use crate::memtable::RecordType;
use crate::sstable::{SstableReader, TableGetResult};
use crate::version::VersionSet;

#[test]
fn flush_job_writes_table_registers_it_and_deletes_wal() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("wal-1.log");
    std::fs::write(&wal_path, b"pretend wal contents").unwrap();

    let version_set = Arc::new(VersionSet::new(7));
    let snapshot = vec![
        (b"a".to_vec(), RecordType::Value, b"1".to_vec()),
        (b"b".to_vec(), RecordType::Value, b"2".to_vec()),
    ];

    let job = build_flush_job(
        dir.path().to_path_buf(),
        1,
        snapshot,
        version_set.clone(),
        wal_path.clone(),
        4096,
        10,
    );
    job();

    assert!(!wal_path.exists());
    let files = version_set.files_at(0).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].smallest_key, b"a");
    assert_eq!(files[0].largest_key, b"b");

    let mut reader = SstableReader::open(&files[0].path).unwrap();
    assert_eq!(reader.get(b"a").unwrap(), TableGetResult::Value(b"1".to_vec()));
}

#[test]
fn flush_job_failure_to_delete_wal_does_not_panic() {
    let dir = tempdir().unwrap();
    let missing_wal = dir.path().join("wal-does-not-exist.log");
    let version_set = Arc::new(VersionSet::new(7));

    let job = build_flush_job(
        dir.path().to_path_buf(),
        1,
        vec![(b"k".to_vec(), RecordType::Value, b"v".to_vec())],
        version_set,
        missing_wal,
        4096,
        10,
    );
    // Must not panic even though the WAL delete step will fail.
    job();
}
