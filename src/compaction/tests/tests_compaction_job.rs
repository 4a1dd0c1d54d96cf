use std::sync::Arc;

use tempfile::tempdir;

use crate::cache::OpenTableCache;
use crate::compaction::build_compaction_job;
use crate::memtable::RecordType;
use crate::sstable::{SstableBuilder, SstableReader, TableGetResult};
use crate::version::{TableFile, VersionSet, table_file_name};

fn write_level0_table(dir: &std::path::Path, version_set: &VersionSet, number: u64, key: &[u8], value: &[u8]) {
    let path = dir.join(table_file_name(0, number));
    let mut builder = SstableBuilder::create(&path).unwrap();
    builder.add(key, RecordType::Value, value).unwrap();
    let meta = builder.finish().unwrap();
    version_set
        .add_file(TableFile {
            level: 0,
            file_number: number,
            path,
            smallest_key: meta.smallest_key,
            largest_key: meta.largest_key,
            file_size: meta.file_size,
        })
        .unwrap();
}

#[test]
fn compaction_merges_five_l0_files_into_one_l1_file() {
    let dir = tempdir().unwrap();
    let version_set = Arc::new(VersionSet::new(7));
    let open_table_cache = Arc::new(OpenTableCache::new(10));

    for i in 1..=5u64 {
        write_level0_table(
            dir.path(),
            &version_set,
            i,
            format!("key-{i}").as_bytes(),
            format!("val-{i}").as_bytes(),
        );
    }

    let job = build_compaction_job(
        dir.path().to_path_buf(),
        0,
        version_set.clone(),
        open_table_cache,
        4096,
        10,
    );
    job();

    assert!(version_set.files_at(0).unwrap().is_empty());
    let l1 = version_set.files_at(1).unwrap();
    assert_eq!(l1.len(), 1);

    let mut reader = SstableReader::open(&l1[0].path).unwrap();
    for i in 1..=5u64 {
        let expect = format!("val-{i}").into_bytes();
        assert_eq!(
            reader.get(format!("key-{i}").as_bytes()).unwrap(),
            TableGetResult::Value(expect)
        );
    }

    // The five input files are gone from disk.
    for i in 1..=5u64 {
        assert!(!dir.path().join(table_file_name(0, i)).exists());
    }
}

#[test]
fn compaction_keeps_the_newest_copy_of_a_duplicate_key() {
    let dir = tempdir().unwrap();
    let version_set = Arc::new(VersionSet::new(7));
    let open_table_cache = Arc::new(OpenTableCache::new(10));

    write_level0_table(dir.path(), &version_set, 1, b"k", b"stale");
    write_level0_table(dir.path(), &version_set, 2, b"k", b"fresh");
    write_level0_table(dir.path(), &version_set, 3, b"k", b"fresher");
    write_level0_table(dir.path(), &version_set, 4, b"k", b"freshest");
    write_level0_table(dir.path(), &version_set, 5, b"k", b"newest");

    let job = build_compaction_job(
        dir.path().to_path_buf(),
        0,
        version_set.clone(),
        open_table_cache,
        4096,
        10,
    );
    job();

    let l1 = version_set.files_at(1).unwrap();
    assert_eq!(l1.len(), 1);
    let mut reader = SstableReader::open(&l1[0].path).unwrap();
    assert_eq!(reader.get(b"k").unwrap(), TableGetResult::Value(b"newest".to_vec()));
}

#[test]
fn compaction_is_a_no_op_when_level_has_no_files() {
    let dir = tempdir().unwrap();
    let version_set = Arc::new(VersionSet::new(7));
    let open_table_cache = Arc::new(OpenTableCache::new(10));

    let job = build_compaction_job(
        dir.path().to_path_buf(),
        0,
        version_set.clone(),
        open_table_cache,
        4096,
        10,
    );
    job();

    assert!(version_set.files_at(0).unwrap().is_empty());
    assert!(version_set.files_at(1).unwrap().is_empty());
}
