use crate::cache::BlockCache;

#[test]
fn put_then_get_round_trips() {
    let cache = BlockCache::new(1024);
    cache.put("t:0".to_string(), vec![1, 2, 3]).unwrap();
    assert_eq!(cache.get("t:0").unwrap(), Some(vec![1, 2, 3]));
}

#[test]
fn miss_returns_none() {
    let cache = BlockCache::new(1024);
    assert_eq!(cache.get("missing").unwrap(), None);
}

#[test]
fn overwrite_updates_value_and_size() {
    let cache = BlockCache::new(1024);
    cache.put("t:0".to_string(), vec![1, 2, 3]).unwrap();
    cache.put("t:0".to_string(), vec![1, 2]).unwrap();
    assert_eq!(cache.get("t:0").unwrap(), Some(vec![1, 2]));
    assert_eq!(cache.current_size(), 2);
}

#[test]
fn evicts_least_recently_used_entry_on_overflow() {
    let cache = BlockCache::new(10);
    cache.put("a".to_string(), vec![0u8; 5]).unwrap();
    cache.put("b".to_string(), vec![0u8; 5]).unwrap();
    // Touch "a" so "b" becomes least-recently-used.
    let _ = cache.get("a").unwrap();
    cache.put("c".to_string(), vec![0u8; 5]).unwrap();

    assert_eq!(cache.get("b").unwrap(), None);
    assert!(cache.get("a").unwrap().is_some());
    assert!(cache.get("c").unwrap().is_some());
}

#[test]
fn capacity_is_respected_after_many_insertions() {
    let cache = BlockCache::new(100);
    for i in 0..50u32 {
        cache.put(format!("k{i}"), vec![0u8; 10]).unwrap();
    }
    assert!(cache.current_size() <= 100);
}
