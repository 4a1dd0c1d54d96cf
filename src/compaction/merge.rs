//! K-Way Merger
//!
//! Combines one already-ascending-ordered iterator per input table into a
//! single ascending stream, used by compaction to build the merged output
//! table.
//!
//! # Algorithm
//!
//! A min-heap is keyed by `(key, precedence)`. On each call to
//! [`KWayMerger::next_entry`]:
//!
//! 1. Pop the smallest entry; record its key and value.
//! 2. Advance the source that produced it, re-pushing its new head if
//!    the source still has entries.
//! 3. Drain every other source whose current head key equals the
//!    recorded key, advancing each in turn — this discards older copies
//!    of the same key carried by other input tables.
//! 4. Return `(key, type, value)`.
//!
//! Precedence tie-break for equal keys: the source at the **lower
//! level** wins (newer data); within level 0, the source with the
//! **higher file number** wins. The merger does not itself suppress
//! duplicate keys across successive calls — only within one call's
//! drain step — so the compaction driver sees exactly one emission per
//! unique key already.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::memtable::RecordType;
use crate::sstable::{SstableError, SstableIterator};

/// One input to a merge: an ascending iterator plus the `(level,
/// file_number)` used to break ties on equal keys.
pub struct MergeSource<'a> {
    iter: SstableIterator<'a>,
    level: usize,
    file_number: u64,
}

impl<'a> MergeSource<'a> {
    pub fn new(iter: SstableIterator<'a>, level: usize, file_number: u64) -> Self {
        MergeSource {
            iter,
            level,
            file_number,
        }
    }
}

/// Lower tuple value wins. Level 0 always outranks any deeper level;
/// within level 0, a higher file number (more recently flushed) wins.
fn precedence_of(level: usize, file_number: u64) -> (u32, u64) {
    if level == 0 {
        (0, u64::MAX - file_number)
    } else {
        (level as u32, 0)
    }
}

struct HeapEntry {
    key: Vec<u8>,
    record_type: RecordType,
    value: Vec<u8>,
    precedence: (u32, u64),
    source_idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.precedence == other.precedence
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// `BinaryHeap` is a max-heap; reversing key+precedence comparison
    /// makes the smallest key (and, on ties, the highest-precedence
    /// source) pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.precedence.cmp(&other.precedence))
            .reverse()
    }
}

/// Merges multiple ascending per-table streams into one ascending
/// stream, resolving equal keys by source precedence.
pub struct KWayMerger<'a> {
    sources: Vec<MergeSource<'a>>,
    heap: BinaryHeap<HeapEntry>,
    primed: bool,
}

impl<'a> KWayMerger<'a> {
    /// Creates a merger over `sources`. The heap is primed lazily on the
    /// first call to [`Self::next_entry`] so construction cannot fail.
    pub fn new(sources: Vec<MergeSource<'a>>) -> Self {
        KWayMerger {
            sources,
            heap: BinaryHeap::new(),
            primed: false,
        }
    }

    fn prime(&mut self) -> Result<(), SstableError> {
        for (idx, source) in self.sources.iter_mut().enumerate() {
            if let Some(entry) = source.iter.next_entry()? {
                self.heap.push(HeapEntry {
                    key: entry.key,
                    record_type: entry.record_type,
                    value: entry.value,
                    precedence: precedence_of(source.level, source.file_number),
                    source_idx: idx,
                });
            }
        }
        self.primed = true;
        Ok(())
    }

    fn advance(&mut self, source_idx: usize) -> Result<(), SstableError> {
        let source = &mut self.sources[source_idx];
        if let Some(entry) = source.iter.next_entry()? {
            self.heap.push(HeapEntry {
                key: entry.key,
                record_type: entry.record_type,
                value: entry.value,
                precedence: precedence_of(source.level, source.file_number),
                source_idx,
            });
        }
        Ok(())
    }

    /// Returns the next `(key, type, value)` in ascending key order, or
    /// `None` once every source is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, RecordType, Vec<u8>)>, SstableError> {
        if !self.primed {
            self.prime()?;
        }

        let Some(top) = self.heap.pop() else {
            return Ok(None);
        };
        let key = top.key;
        let record_type = top.record_type;
        let value = top.value;
        self.advance(top.source_idx)?;

        loop {
            let matches = self.heap.peek().map(|e| e.key == key).unwrap_or(false);
            if !matches {
                break;
            }
            // Safe: `matches` was true only if `peek()` returned `Some`.
            let dup = self.heap.pop().expect("heap entry observed via peek");
            self.advance(dup.source_idx)?;
        }

        Ok(Some((key, record_type, value)))
    }
}
