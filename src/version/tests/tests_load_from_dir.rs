use tempfile::tempdir;

use crate::memtable::RecordType;
use crate::sstable::SstableBuilder;
use crate::version::{VersionSet, table_file_name};

#[test]
fn load_from_dir_recovers_levels_and_bounds() {
    let dir = tempdir().unwrap();

    let path0 = dir.path().join(table_file_name(0, 1));
    let mut b = SstableBuilder::create(&path0).unwrap();
    b.add(b"b", RecordType::Value, b"1").unwrap();
    b.add(b"d", RecordType::Value, b"2").unwrap();
    b.finish().unwrap();

    let path1 = dir.path().join(table_file_name(1, 2));
    let mut b = SstableBuilder::create(&path1).unwrap();
    b.add(b"a", RecordType::Value, b"1").unwrap();
    b.add(b"z", RecordType::Value, b"2").unwrap();
    b.finish().unwrap();

    let vs = VersionSet::new(7);
    vs.load_from_dir(dir.path()).unwrap();

    let l0 = vs.files_at(0).unwrap();
    assert_eq!(l0.len(), 1);
    assert_eq!(l0[0].smallest_key, b"b");
    assert_eq!(l0[0].largest_key, b"d");

    let l1 = vs.files_at(1).unwrap();
    assert_eq!(l1.len(), 1);
    assert_eq!(l1[0].smallest_key, b"a");
    assert_eq!(l1[0].largest_key, b"z");

    assert_eq!(vs.next_file_number().unwrap(), 3);
}

#[test]
fn load_from_dir_skips_unreadable_tables() {
    let dir = tempdir().unwrap();

    let bad_path = dir.path().join(table_file_name(0, 1));
    std::fs::write(&bad_path, b"not a table").unwrap();

    let good_path = dir.path().join(table_file_name(0, 2));
    let mut b = SstableBuilder::create(&good_path).unwrap();
    b.add(b"k", RecordType::Value, b"v").unwrap();
    b.finish().unwrap();

    let vs = VersionSet::new(7);
    vs.load_from_dir(dir.path()).unwrap();

    let l0 = vs.files_at(0).unwrap();
    assert_eq!(l0.len(), 1);
    assert_eq!(l0[0].file_number, 2);
}

#[test]
fn load_from_dir_ignores_unrelated_files() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("wal-1.log"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

    let vs = VersionSet::new(7);
    vs.load_from_dir(dir.path()).unwrap();

    assert!(vs.files_at(0).unwrap().is_empty());
}
