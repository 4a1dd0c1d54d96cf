use crate::memtable::RecordType;
use crate::wal::{WalReader, WalRecord, WalWriter};
use tempfile::TempDir;

#[test]
fn append_and_replay_single_record() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wal-000000.log");

    let writer = WalWriter::open(&path).unwrap();
    writer
        .append(RecordType::Value, b"foo", b"bar", true)
        .unwrap();

    let records = WalReader::open(&path).unwrap().replay_all().unwrap();
    assert_eq!(
        records,
        vec![WalRecord {
            record_type: RecordType::Value,
            key: b"foo".to_vec(),
            value: b"bar".to_vec(),
        }]
    );
}

#[test]
fn replay_preserves_physical_order() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wal-000000.log");

    let writer = WalWriter::open(&path).unwrap();
    writer.append(RecordType::Value, b"a", b"1", false).unwrap();
    writer.append(RecordType::Value, b"b", b"2", false).unwrap();
    writer
        .append(RecordType::Deletion, b"a", b"", false)
        .unwrap();

    let records = WalReader::open(&path).unwrap().replay_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].key, b"a");
    assert_eq!(records[0].record_type, RecordType::Value);
    assert_eq!(records[1].key, b"b");
    assert_eq!(records[2].key, b"a");
    assert_eq!(records[2].record_type, RecordType::Deletion);
}

#[test]
fn empty_key_and_value_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wal-000000.log");

    let writer = WalWriter::open(&path).unwrap();
    writer.append(RecordType::Value, b"", b"", true).unwrap();

    let records = WalReader::open(&path).unwrap().replay_all().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].key.is_empty());
    assert!(records[0].value.is_empty());
}

#[test]
fn reopening_an_appended_segment_continues_appending() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wal-000000.log");

    {
        let writer = WalWriter::open(&path).unwrap();
        writer.append(RecordType::Value, b"x", b"1", true).unwrap();
    }
    {
        let writer = WalWriter::open(&path).unwrap();
        writer.append(RecordType::Value, b"y", b"2", true).unwrap();
    }

    let records = WalReader::open(&path).unwrap().replay_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].key, b"x");
    assert_eq!(records[1].key, b"y");
}

#[test]
fn path_reflects_the_opened_segment() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("wal-000042.log");
    let writer = WalWriter::open(&path).unwrap();
    assert_eq!(writer.path(), path.as_path());
}
