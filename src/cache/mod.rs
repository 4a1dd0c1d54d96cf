//! Cache Module
//!
//! Two independent, mutex-guarded caches used by the read path:
//!
//! - [`BlockCache`] — a byte-capacity LRU of decoded data block bytes,
//!   keyed by `"<table path>:<block offset>"`.
//! - [`OpenTableCache`] — a file-count-bounded map from table path to an
//!   already-open [`SstableReader`], avoiding a fresh `open` + footer/
//!   index/filter read on every lookup.
//!
//! Both caches have their own mutex, disjoint from the database lock and
//! the version set's lock (see SPEC_FULL §5).

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

use crate::sstable::{SstableError, SstableReader};

/// Errors produced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The internal lock was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),

    /// Underlying table I/O failure while opening a reader for the
    /// open-table cache.
    #[error("table error: {0}")]
    Table(#[from] SstableError),
}

// ------------------------------------------------------------------------------------------------
// Block cache — bounded LRU keyed by "path:offset"
// ------------------------------------------------------------------------------------------------

struct Node {
    key: String,
    value: Vec<u8>,
    prev: Option<usize>,
    next: Option<usize>,
}

struct BlockCacheInner {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    total_bytes: usize,
}

/// A bounded LRU cache of raw data block bytes. Capacity is measured in
/// total cached payload bytes, not entry count.
pub struct BlockCache {
    inner: Mutex<BlockCacheInner>,
    capacity_bytes: usize,
}

impl BlockCache {
    /// Creates a cache that holds at most `capacity_bytes` of block
    /// payload in total.
    pub fn new(capacity_bytes: usize) -> Self {
        BlockCache {
            inner: Mutex::new(BlockCacheInner {
                nodes: Vec::new(),
                free: Vec::new(),
                index: HashMap::new(),
                head: None,
                tail: None,
                total_bytes: 0,
            }),
            capacity_bytes,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BlockCacheInner>, CacheError> {
        self.inner
            .lock()
            .map_err(|_| CacheError::Internal("block cache lock poisoned".into()))
    }

    /// Returns a copy of the cached bytes for `key`, promoting it to
    /// most-recently-used, or `None` on a miss.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut inner = self.lock()?;
        let Some(&idx) = inner.index.get(key) else {
            return Ok(None);
        };
        detach(&mut inner, idx);
        push_front(&mut inner, idx);
        Ok(Some(inner.nodes[idx].value.clone()))
    }

    /// Inserts or overwrites the cached bytes for `key`, evicting
    /// least-recently-used entries until total usage is within capacity.
    pub fn put(&self, key: String, value: Vec<u8>) -> Result<(), CacheError> {
        let mut inner = self.lock()?;
        if let Some(&idx) = inner.index.get(&key) {
            let old_len = inner.nodes[idx].value.len();
            inner.total_bytes = inner.total_bytes - old_len + value.len();
            inner.nodes[idx].value = value;
            detach(&mut inner, idx);
            push_front(&mut inner, idx);
        } else {
            let added = value.len();
            let idx = match inner.free.pop() {
                Some(idx) => {
                    inner.nodes[idx] = Node {
                        key: key.clone(),
                        value,
                        prev: None,
                        next: None,
                    };
                    idx
                }
                None => {
                    inner.nodes.push(Node {
                        key: key.clone(),
                        value,
                        prev: None,
                        next: None,
                    });
                    inner.nodes.len() - 1
                }
            };
            inner.index.insert(key, idx);
            push_front(&mut inner, idx);
            inner.total_bytes += added;
        }

        while inner.total_bytes > self.capacity_bytes {
            let Some(victim) = inner.tail else { break };
            let victim_key = inner.nodes[victim].key.clone();
            let victim_len = inner.nodes[victim].value.len();
            detach(&mut inner, victim);
            inner.index.remove(&victim_key);
            inner.nodes[victim].value = Vec::new();
            inner.nodes[victim].key.clear();
            inner.free.push(victim);
            inner.total_bytes -= victim_len;
        }
        Ok(())
    }

    /// Number of bytes currently cached.
    pub fn current_size(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.total_bytes,
            Err(poisoned) => poisoned.into_inner().total_bytes,
        }
    }
}

fn detach(inner: &mut BlockCacheInner, idx: usize) {
    let (prev, next) = (inner.nodes[idx].prev, inner.nodes[idx].next);
    match prev {
        Some(p) => inner.nodes[p].next = next,
        None => inner.head = next,
    }
    match next {
        Some(n) => inner.nodes[n].prev = prev,
        None => inner.tail = prev,
    }
    inner.nodes[idx].prev = None;
    inner.nodes[idx].next = None;
}

fn push_front(inner: &mut BlockCacheInner, idx: usize) {
    inner.nodes[idx].prev = None;
    inner.nodes[idx].next = inner.head;
    if let Some(old_head) = inner.head {
        inner.nodes[old_head].prev = Some(idx);
    }
    inner.head = Some(idx);
    if inner.tail.is_none() {
        inner.tail = Some(idx);
    }
}

// ------------------------------------------------------------------------------------------------
// Open-table cache — bounded by file count, arbitrary eviction
// ------------------------------------------------------------------------------------------------

/// A bounded map from table path to an already-open reader. Eviction
/// picks an arbitrary entry on overflow: correctness of the read path
/// does not depend on which entry is evicted, only that the map stays
/// within its configured size (see SPEC_FULL §9 item 6).
pub struct OpenTableCache {
    inner: Mutex<HashMap<std::path::PathBuf, std::sync::Arc<Mutex<SstableReader>>>>,
    max_open_files: usize,
}

impl OpenTableCache {
    pub fn new(max_open_files: usize) -> Self {
        OpenTableCache {
            inner: Mutex::new(HashMap::new()),
            max_open_files,
        }
    }

    /// Returns an already-open reader for `path`, opening and caching
    /// one on a miss.
    pub fn get_or_open(
        &self,
        path: &Path,
    ) -> Result<std::sync::Arc<Mutex<SstableReader>>, CacheError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CacheError::Internal("open-table cache lock poisoned".into()))?;
        if let Some(reader) = map.get(path) {
            return Ok(reader.clone());
        }
        let reader = std::sync::Arc::new(Mutex::new(SstableReader::open(path)?));
        if map.len() >= self.max_open_files {
            if let Some(victim) = map.keys().next().cloned() {
                map.remove(&victim);
            }
        }
        map.insert(path.to_path_buf(), reader.clone());
        Ok(reader)
    }

    /// Removes the cached reader for `path`, if any. Used when a table
    /// file is deleted by compaction so a stale handle is not reused.
    pub fn erase(&self, path: &Path) -> Result<(), CacheError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CacheError::Internal("open-table cache lock poisoned".into()))?;
        map.remove(path);
        Ok(())
    }

    /// Number of readers currently cached.
    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
