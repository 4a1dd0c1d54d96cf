use crate::memtable::{Memtable, RecordType};

#[test]
fn snapshot_ordered_is_ascending_by_key() {
    let mt = Memtable::new();
    for k in [b"c".to_vec(), b"a".to_vec(), b"b".to_vec()] {
        mt.add(k.clone(), k, RecordType::Value).unwrap();
    }

    let snapshot = mt.snapshot_ordered().unwrap();
    let keys: Vec<_> = snapshot.iter().map(|(k, _, _)| k.clone()).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
}

#[test]
fn snapshot_ordered_is_independent_of_later_mutation() {
    let mt = Memtable::new();
    mt.add(b"a".to_vec(), b"1".to_vec(), RecordType::Value)
        .unwrap();
    let snapshot = mt.snapshot_ordered().unwrap();

    mt.add(b"a".to_vec(), b"2".to_vec(), RecordType::Value)
        .unwrap();
    mt.add(b"b".to_vec(), b"3".to_vec(), RecordType::Value)
        .unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].2, b"1");
}

#[test]
fn snapshot_ordered_preserves_tombstones() {
    let mt = Memtable::new();
    mt.add(b"a".to_vec(), b"1".to_vec(), RecordType::Value)
        .unwrap();
    mt.add(b"b".to_vec(), Vec::new(), RecordType::Deletion)
        .unwrap();

    let snapshot = mt.snapshot_ordered().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0], (b"a".to_vec(), RecordType::Value, b"1".to_vec()));
    assert_eq!(snapshot[1], (b"b".to_vec(), RecordType::Deletion, Vec::new()));
}
