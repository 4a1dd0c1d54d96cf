//! # Memtable Module
//!
//! The in-memory, ordered write buffer of the storage engine.
//!
//! ## Design Invariants
//!
//! - Keys are unique; inserting an existing key overwrites its value and
//!   type in place (last write wins).
//! - Deletes are represented as tombstones (`RecordType::Deletion`), not
//!   physical removal — the memtable never suppresses a key on its own.
//! - `snapshot_ordered` yields an owned, ascending-key-order copy that is
//!   independent of subsequent mutations; it is what a flush job consumes.
//! - `approximate_memory_usage` is a monotonic proxy good enough to decide
//!   when to rotate; it is not required to track real heap usage exactly.
//!
//! The memtable does not own a WAL or a size threshold policy — both are
//! the database façade's responsibility (see [`crate::engine`]). This
//! keeps the memtable a plain, synchronously-usable ordered map.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::trace;

/// Errors produced by [`Memtable`] operations.
#[derive(Debug, Error)]
pub enum MemtableError {
    /// The internal lock was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The type tag stored alongside every value.
///
/// Mirrors the on-disk `type_byte` used in WAL records and SSTable data
/// blocks, so the same enum flows unchanged from write path to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A live value.
    Value = 1,
    /// A tombstone; the paired byte payload is ignored but still framed.
    Deletion = 2,
}

impl RecordType {
    /// Decode a raw type byte, rejecting anything not in `{1, 2}`.
    pub fn from_byte(b: u8) -> Result<Self, MemtableError> {
        match b {
            1 => Ok(RecordType::Value),
            2 => Ok(RecordType::Deletion),
            other => Err(MemtableError::Internal(format!(
                "invalid record type byte {other}"
            ))),
        }
    }
}

/// The result of a point lookup against the memtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemtableEntry {
    /// Whether the entry is a live value or a tombstone.
    pub record_type: RecordType,
    /// The value bytes. Empty and meaningless for a tombstone.
    pub value: Vec<u8>,
}

/// Per-entry bookkeeping overhead added to the approximate size estimate,
/// accounting for the key/value pair's container overhead beyond its raw
/// byte length.
const ENTRY_OVERHEAD_BYTES: usize = 24;

struct MemtableInner {
    table: BTreeMap<Vec<u8>, MemtableEntry>,
    approximate_size: usize,
}

/// The in-memory, ordered write buffer.
///
/// Implemented as a `BTreeMap` behind an `RwLock` rather than the
/// canonical skip list: both give ordered traversal and unique-key
/// overwrite semantics, and `BTreeMap` gets there without hand-rolled
/// probabilistic balancing. See `DESIGN.md` for the full rationale.
pub struct Memtable {
    inner: RwLock<MemtableInner>,
}

impl Memtable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Memtable {
            inner: RwLock::new(MemtableInner {
                table: BTreeMap::new(),
                approximate_size: 0,
            }),
        }
    }

    /// Inserts or overwrites `key` with `(record_type, value)`.
    ///
    /// On insert, the size estimate grows by `key.len() + value.len() +
    /// ENTRY_OVERHEAD_BYTES`; on overwrite, only by `value.len()` (the
    /// key and entry overhead are already accounted for).
    pub fn add(&self, key: Vec<u8>, value: Vec<u8>, record_type: RecordType) -> Result<(), MemtableError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        let added = value.len();
        let key_len = key.len();
        let previous = inner
            .table
            .insert(key, MemtableEntry { record_type, value });
        match previous {
            Some(_) => inner.approximate_size += added,
            None => inner.approximate_size += key_len + added + ENTRY_OVERHEAD_BYTES,
        }
        trace!(key_len, value_len = added, "memtable add");
        Ok(())
    }

    /// Exact-match lookup; returns `None` if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<MemtableEntry>, MemtableError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        Ok(inner.table.get(key).cloned())
    }

    /// Returns every `(key, record_type, value)` triple in ascending key
    /// order. The snapshot is an owned copy, independent of further
    /// mutation to this memtable.
    pub fn snapshot_ordered(&self) -> Result<Vec<(Vec<u8>, RecordType, Vec<u8>)>, MemtableError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        Ok(inner
            .table
            .iter()
            .map(|(k, v)| (k.clone(), v.record_type, v.value.clone()))
            .collect())
    }

    /// A monotonic proxy for the memtable's in-memory footprint, used to
    /// decide when to trigger a rotation. Not required to be precise.
    pub fn approximate_memory_usage(&self) -> usize {
        match self.inner.read() {
            Ok(inner) => inner.approximate_size,
            Err(poisoned) => poisoned.into_inner().approximate_size,
        }
    }

    /// Number of distinct keys currently held.
    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(inner) => inner.table.len(),
            Err(poisoned) => poisoned.into_inner().table.len(),
        }
    }

    /// Whether the memtable holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Memtable::new()
    }
}
