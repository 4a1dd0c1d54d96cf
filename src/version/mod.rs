//! Version Set Module
//!
//! The in-memory catalog of every live table file, partitioned by level.
//! There is no persistent manifest: the catalog is rebuilt on open by
//! scanning the data directory and reading each table's own footer and
//! index (see [`VersionSet::load_from_dir`]).
//!
//! # Invariants
//!
//! - Level 0 files may overlap in key range; within the level they are
//!   ordered by **descending** file number (newest first).
//! - For any level `>= 1`, files are pairwise key-disjoint and stored in
//!   **ascending** smallest-key order.
//! - File numbers are globally monotonic across all levels.
//!
//! All mutating operations are serialized under a single mutex. The read
//! path ([`VersionSet::get_candidate_files`]) copies the candidate list
//! before releasing the mutex, so no I/O ever happens while the lock is
//! held.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, warn};

use crate::sstable::{SstableError, SstableReader};

/// Errors produced by [`VersionSet`] operations.
#[derive(Debug, Error)]
pub enum VersionError {
    /// The internal lock was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),

    /// Underlying filesystem failure while scanning the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// In-memory metadata for one on-disk table file.
#[derive(Debug, Clone)]
pub struct TableFile {
    pub level: usize,
    pub file_number: u64,
    pub path: PathBuf,
    pub smallest_key: Vec<u8>,
    pub largest_key: Vec<u8>,
    pub file_size: u64,
}

impl TableFile {
    fn overlaps(&self, other: &TableFile) -> bool {
        self.smallest_key <= other.largest_key && other.smallest_key <= self.largest_key
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.smallest_key.as_slice() <= key && key <= self.largest_key.as_slice()
    }
}

struct VersionSetInner {
    /// `levels[0]` is level 0, `levels[num_levels-1]` the deepest level.
    levels: Vec<Vec<TableFile>>,
    max_file_number: u64,
}

/// The catalog of live table files, partitioned by level.
pub struct VersionSet {
    inner: Mutex<VersionSetInner>,
    num_levels: usize,
    /// Level 0 is compacted once it holds more than this many files.
    level0_compaction_trigger: usize,
}

/// Builds a table file's name: `L<level>-<number>.sst`.
pub fn table_file_name(level: usize, file_number: u64) -> String {
    format!("L{level}-{file_number}.sst")
}

impl VersionSet {
    /// Creates an empty catalog with `num_levels` levels (level 0 .. level
    /// `num_levels - 1`).
    pub fn new(num_levels: usize) -> Self {
        VersionSet {
            inner: Mutex::new(VersionSetInner {
                levels: (0..num_levels).map(|_| Vec::new()).collect(),
                max_file_number: 0,
            }),
            num_levels,
            level0_compaction_trigger: 4,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VersionSetInner>, VersionError> {
        self.inner
            .lock()
            .map_err(|_| VersionError::Internal("version set lock poisoned".into()))
    }

    /// Inserts `file`, re-sorting its level to preserve the ordering
    /// invariant, and advances the maximum file number if needed.
    pub fn add_file(&self, file: TableFile) -> Result<(), VersionError> {
        let mut inner = self.lock()?;
        if inner.max_file_number < file.file_number {
            inner.max_file_number = file.file_number;
        }
        let level = file.level;
        inner.levels[level].push(file);
        if level == 0 {
            // Newest first: descending file number.
            inner.levels[0].sort_by(|a, b| b.file_number.cmp(&a.file_number));
        } else {
            inner.levels[level].sort_by(|a, b| a.smallest_key.cmp(&b.smallest_key));
        }
        Ok(())
    }

    /// Removes one file by `(level, number)`. A no-op if no such file
    /// exists.
    pub fn remove_file(&self, level: usize, number: u64) -> Result<(), VersionError> {
        let mut inner = self.lock()?;
        if let Some(files) = inner.levels.get_mut(level) {
            files.retain(|f| f.file_number != number);
        }
        Ok(())
    }

    /// Returns and reserves the next file number.
    pub fn next_file_number(&self) -> Result<u64, VersionError> {
        let mut inner = self.lock()?;
        inner.max_file_number += 1;
        Ok(inner.max_file_number)
    }

    /// Bumps the tracked maximum file number up to `number` if it is
    /// larger, without handing it out. Used during WAL recovery: WAL
    /// segments share the same monotonic counter as table files, so a
    /// WAL segment number observed on disk (which `load_from_dir` never
    /// sees, since it only scans `.sst` files) must still advance the
    /// counter to preserve global monotonicity.
    pub fn observe_file_number(&self, number: u64) -> Result<(), VersionError> {
        let mut inner = self.lock()?;
        if inner.max_file_number < number {
            inner.max_file_number = number;
        }
        Ok(())
    }

    /// Atomically removes every `(level, file_number)` in `removed` and
    /// inserts `added` (if any) under a single lock acquisition — the
    /// "swap inputs for outputs" step of a compaction job.
    pub fn install_compaction_result(
        &self,
        removed: &[(usize, u64)],
        added: Option<TableFile>,
    ) -> Result<(), VersionError> {
        let mut inner = self.lock()?;
        for (level, number) in removed {
            if let Some(files) = inner.levels.get_mut(*level) {
                files.retain(|f| f.file_number != *number);
            }
        }
        if let Some(file) = added {
            if inner.max_file_number < file.file_number {
                inner.max_file_number = file.file_number;
            }
            let level = file.level;
            inner.levels[level].push(file);
            if level == 0 {
                inner.levels[0].sort_by(|a, b| b.file_number.cmp(&a.file_number));
            } else {
                inner.levels[level].sort_by(|a, b| a.smallest_key.cmp(&b.smallest_key));
            }
        }
        Ok(())
    }

    /// Returns level 0 if it has more than the compaction trigger's
    /// worth of files; otherwise `None`. Deeper levels are never picked
    /// — this deliberately simple policy is preserved from the design
    /// this catalog was distilled from.
    pub fn pick_compaction_level(&self) -> Result<Option<usize>, VersionError> {
        let inner = self.lock()?;
        if inner.levels[0].len() > self.level0_compaction_trigger {
            Ok(Some(0))
        } else {
            Ok(None)
        }
    }

    /// Returns `(L, N)`: every file at `level` plus every file at
    /// `level + 1` whose key range intersects the union of `L`'s
    /// ranges. `N` is empty if `level + 1` does not exist.
    pub fn pick_compaction_inputs(
        &self,
        level: usize,
    ) -> Result<(Vec<TableFile>, Vec<TableFile>), VersionError> {
        let inner = self.lock()?;
        let l: Vec<TableFile> = inner.levels.get(level).cloned().unwrap_or_default();
        if l.is_empty() {
            return Ok((l, Vec::new()));
        }
        let next_level = level + 1;
        let n = match inner.levels.get(next_level) {
            None => Vec::new(),
            Some(files) => {
                let min = l.iter().map(|f| &f.smallest_key).min().cloned().unwrap_or_default();
                let max = l.iter().map(|f| &f.largest_key).max().cloned().unwrap_or_default();
                let union = TableFile {
                    level: next_level,
                    file_number: 0,
                    path: PathBuf::new(),
                    smallest_key: min,
                    largest_key: max,
                    file_size: 0,
                };
                files.iter().filter(|f| f.overlaps(&union)).cloned().collect()
            }
        };
        Ok((l, n))
    }

    /// Returns the candidate files to probe for `key`, in the order the
    /// read path must search them: level 0 (every overlapping file,
    /// newest file number first), then at most one file per deeper
    /// level.
    pub fn get_candidate_files(&self, key: &[u8]) -> Result<Vec<TableFile>, VersionError> {
        let inner = self.lock()?;
        let mut candidates = Vec::new();
        for file in &inner.levels[0] {
            if file.contains(key) {
                candidates.push(file.clone());
            }
        }
        for level_files in inner.levels.iter().skip(1) {
            if level_files.is_empty() {
                continue;
            }
            match level_files.binary_search_by(|f| f.smallest_key.as_slice().cmp(key)) {
                Ok(idx) => candidates.push(level_files[idx].clone()),
                Err(0) => {}
                Err(idx) => {
                    let candidate = &level_files[idx - 1];
                    if candidate.contains(key) {
                        candidates.push(candidate.clone());
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// Rebuilds the catalog from the files physically present in `dir`,
    /// opening each to extract its smallest/largest key from its index
    /// and re-establishing the max file number. A table whose footer
    /// cannot be read is skipped and logged, not treated as a fatal
    /// error — table-open failures during recovery are a known,
    /// tolerated failure mode.
    pub fn load_from_dir<P: AsRef<Path>>(&self, dir: P) -> Result<(), VersionError> {
        let dir = dir.as_ref();
        let mut discovered: Vec<TableFile> = Vec::new();
        let mut max_number = 0u64;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((level, number)) = parse_table_file_name(name) else {
                continue;
            };
            match open_table_meta(&path, level, number) {
                Ok(meta) => {
                    if number > max_number {
                        max_number = number;
                    }
                    discovered.push(meta);
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping unreadable table file during recovery");
                }
            }
        }

        let mut levels: Vec<Vec<TableFile>> = (0..self.num_levels).map(|_| Vec::new()).collect();
        for file in discovered {
            if file.level < levels.len() {
                levels[file.level].push(file);
            }
        }
        for file in levels[0].iter() {
            debug!(number = file.file_number, "recovered level-0 table");
        }
        levels[0].sort_by(|a, b| b.file_number.cmp(&a.file_number));
        for level_files in levels.iter_mut().skip(1) {
            level_files.sort_by(|a, b| a.smallest_key.cmp(&b.smallest_key));
        }

        let mut inner = self.lock()?;
        inner.levels = levels;
        if inner.max_file_number < max_number {
            inner.max_file_number = max_number;
        }
        Ok(())
    }

    /// Number of levels in this catalog.
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Snapshot of every file currently at `level`, for diagnostics and
    /// tests.
    pub fn files_at(&self, level: usize) -> Result<Vec<TableFile>, VersionError> {
        let inner = self.lock()?;
        Ok(inner.levels.get(level).cloned().unwrap_or_default())
    }
}

fn parse_table_file_name(name: &str) -> Option<(usize, u64)> {
    let rest = name.strip_prefix('L')?;
    let rest = rest.strip_suffix(".sst")?;
    let (level_str, number_str) = rest.split_once('-')?;
    let level = level_str.parse().ok()?;
    let number = number_str.parse().ok()?;
    Some((level, number))
}

fn open_table_meta(path: &Path, level: usize, file_number: u64) -> Result<TableFile, SstableError> {
    let mut reader = SstableReader::open(path)?;
    let entries = reader.index_entries().to_vec();
    let smallest_key = entries.first().map(|e| e.separator_key.clone()).unwrap_or_default();
    // The index only stores each block's *first* key; the true largest
    // key in the table is the last entry of the last block.
    let largest_key = match entries.last() {
        Some(last) => {
            let block = reader.read_data_block(last.offset, last.size)?;
            let mut largest = last.separator_key.clone();
            for parsed in crate::sstable::block::DataBlockReader::new(&block) {
                largest = parsed.key;
            }
            largest
        }
        None => Vec::new(),
    };
    let file_size = reader.file_size()?;
    Ok(TableFile {
        level,
        file_number,
        path: path.to_path_buf(),
        smallest_key,
        largest_key,
        file_size,
    })
}
