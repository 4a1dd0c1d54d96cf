//! Database Façade
//!
//! Wires the memtable, WAL, version set, caches, and background worker
//! into the public `Engine` handle.
//!
//! # Write path
//!
//! `put`/`delete` append a WAL record, then apply the same mutation to
//! the active memtable. If the memtable's approximate size has crossed
//! [`EngineConfig::write_buffer_size`], a rotation runs before the call
//! returns: the active memtable is moved into the (single) immutable
//! slot, a fresh memtable and WAL segment replace it, and a flush job
//! for the old memtable's snapshot is handed to the background worker.
//! A rotation requested while the immutable slot is already occupied is
//! a no-op — there is no write back-pressure in this design.
//!
//! # Read path
//!
//! `get` probes the active memtable, then the immutable memtable (if
//! any), then the on-disk candidate files returned by the version set
//! in search order (level 0 newest-first, then at most one file per
//! deeper level), stopping at the first hit — a live value, a
//! tombstone, or the end of the candidate list.
//!
//! # Recovery
//!
//! [`Engine::open`] rebuilds the version set by scanning the data
//! directory for table files, then replays every `wal-<number>.log`
//! segment present (oldest first) into a fresh memtable before opening
//! a new WAL segment for further writes. A segment that replays
//! cleanly is deleted; a segment that errors partway through is only
//! replayed up to the failure point, matching the WAL reader's own
//! "stop, don't fail" contract.

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{BlockCache, CacheError, OpenTableCache};
use crate::compaction::{CompactionError, Worker, build_flush_job, maybe_schedule_compaction};
use crate::memtable::{Memtable, MemtableError, RecordType};
use crate::sstable::{DEFAULT_BLOCK_SIZE, DEFAULT_BLOOM_BITS_PER_KEY, SstableError, TableGetResult};
use crate::version::{VersionError, VersionSet};
use crate::wal::{WalError, WalReader, WalWriter};

/// Errors produced by [`Engine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("memtable error: {0}")]
    Memtable(#[from] MemtableError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("table error: {0}")]
    Table(#[from] SstableError),

    #[error("version set error: {0}")]
    Version(#[from] VersionError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("compaction error: {0}")]
    Compaction(#[from] CompactionError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No live value exists for the key, either because it was never
    /// written or because the most recent write was a deletion. The
    /// message distinguishes the two cases for diagnostics; callers
    /// that only care about presence should match on the variant, not
    /// the string.
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Tuning knobs for an [`Engine`], mirroring the options a production
/// embedded store exposes at open time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Approximate memtable size, in bytes, that triggers a rotation.
    pub write_buffer_size: usize,
    /// Target uncompressed data block size used by table writers.
    pub block_size: usize,
    /// Total byte budget for the shared block cache.
    pub block_cache_capacity: usize,
    /// Bits per key used to size each table's Bloom filter.
    pub bloom_bits_per_key: u32,
    /// Maximum number of table readers kept open at once.
    pub max_open_files: usize,
    /// Number of levels in the version set (level 0 .. num_levels - 1).
    pub num_levels: usize,
    /// Create the data directory if it does not already exist.
    pub create_if_missing: bool,
    /// Fail `open` if the data directory already exists.
    pub error_if_exists: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            write_buffer_size: 4 * 1024 * 1024,
            block_size: DEFAULT_BLOCK_SIZE,
            block_cache_capacity: 64 * 1024 * 1024,
            bloom_bits_per_key: DEFAULT_BLOOM_BITS_PER_KEY,
            max_open_files: 500,
            num_levels: 7,
            create_if_missing: true,
            error_if_exists: false,
        }
    }
}

/// Per-call write tuning, analogous to a write-options struct in other
/// embedded stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Whether to fsync the WAL segment after appending this record.
    pub sync: bool,
}

/// Per-call read tuning.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Whether a block fetched from disk during this lookup should be
    /// inserted into the shared block cache.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { fill_cache: true }
    }
}

struct EngineState {
    memtable: Arc<Memtable>,
    immutable: Option<Arc<Memtable>>,
    wal: WalWriter,
}

struct EngineInner {
    dir: PathBuf,
    config: EngineConfig,
    state: RwLock<EngineState>,
    version_set: Arc<VersionSet>,
    block_cache: Arc<BlockCache>,
    open_table_cache: Arc<OpenTableCache>,
    worker: Worker,
}

/// A handle to an open database. Cheaply cloneable — every clone shares
/// the same underlying state, caches, and background worker.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
    /// Opens (or creates) the database rooted at `db_path`.
    ///
    /// Rebuilds the version set by scanning for table files, replays
    /// any WAL segments left over from an unclean shutdown into a
    /// fresh memtable, then opens a new WAL segment for subsequent
    /// writes.
    pub fn open<P: AsRef<Path>>(config: EngineConfig, db_path: P) -> Result<Engine, EngineError> {
        let dir = db_path.as_ref().to_path_buf();
        let exists = dir.exists();

        if exists && config.error_if_exists {
            return Err(EngineError::InvalidArgument(format!(
                "database already exists at {}",
                dir.display()
            )));
        }
        if !exists {
            if !config.create_if_missing {
                return Err(EngineError::InvalidArgument(format!(
                    "database does not exist at {} and create_if_missing is false",
                    dir.display()
                )));
            }
            fs::create_dir_all(&dir)?;
        }

        let version_set = Arc::new(VersionSet::new(config.num_levels));
        version_set.load_from_dir(&dir)?;

        let memtable = Arc::new(Memtable::new());
        recover_wal(&dir, &memtable, &version_set)?;

        let wal_number = version_set.next_file_number()?;
        let wal_path = wal_segment_path(&dir, wal_number);
        let wal = WalWriter::open(&wal_path)?;

        let block_cache = Arc::new(BlockCache::new(config.block_cache_capacity));
        let open_table_cache = Arc::new(OpenTableCache::new(config.max_open_files));
        let worker = Worker::start();

        info!(path = %dir.display(), wal_number, "database opened");

        Ok(Engine(Arc::new(EngineInner {
            dir,
            config,
            state: RwLock::new(EngineState {
                memtable,
                immutable: None,
                wal,
            }),
            version_set,
            block_cache,
            open_table_cache,
            worker,
        })))
    }

    /// Writes `key => value`, appending it to the WAL before applying
    /// it to the active memtable. Triggers a rotation if the memtable
    /// has grown past its configured size.
    pub fn put(&self, opts: WriteOptions, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        self.write_record(RecordType::Value, key, value, opts.sync)
    }

    /// Records a tombstone for `key`. Like `put`, durable in the WAL
    /// before it is visible to readers.
    pub fn delete(&self, opts: WriteOptions, key: &[u8]) -> Result<(), EngineError> {
        self.write_record(RecordType::Deletion, key, &[], opts.sync)
    }

    fn write_record(
        &self,
        record_type: RecordType,
        key: &[u8],
        value: &[u8],
        sync: bool,
    ) -> Result<(), EngineError> {
        let memtable = {
            let state = self
                .0
                .state
                .read()
                .map_err(|_| EngineError::Internal("engine state lock poisoned".into()))?;
            state.wal.append(record_type, key, value, sync)?;
            state.memtable.add(key.to_vec(), value.to_vec(), record_type)?;
            state.memtable.clone()
        };

        if memtable.approximate_memory_usage() >= self.0.config.write_buffer_size {
            self.rotate()?;
        }
        Ok(())
    }

    /// Looks up `key`, searching the active memtable, the immutable
    /// memtable (if any), then on-disk table files in catalog search
    /// order. Returns [`EngineError::NotFound`] both when the key was
    /// never written and when its most recent write was a deletion.
    pub fn get(&self, opts: ReadOptions, key: &[u8]) -> Result<Vec<u8>, EngineError> {
        {
            let state = self
                .0
                .state
                .read()
                .map_err(|_| EngineError::Internal("engine state lock poisoned".into()))?;
            if let Some(entry) = state.memtable.get(key)? {
                return resolve_memtable_entry(entry);
            }
            if let Some(imm) = &state.immutable {
                if let Some(entry) = imm.get(key)? {
                    return resolve_memtable_entry(entry);
                }
            }
        }

        let candidates = self.0.version_set.get_candidate_files(key)?;
        for file in candidates {
            let reader_handle = self.0.open_table_cache.get_or_open(&file.path)?;
            let mut reader = reader_handle
                .lock()
                .map_err(|_| EngineError::Internal("table reader lock poisoned".into()))?;
            match reader.get_with_cache(key, Some(&self.0.block_cache), opts.fill_cache)? {
                TableGetResult::Value(value) => return Ok(value),
                TableGetResult::Deletion => {
                    return Err(EngineError::NotFound("deleted".into()));
                }
                TableGetResult::NotFound => continue,
            }
        }
        Err(EngineError::NotFound("not found".into()))
    }

    /// Forces a rotation of the active memtable, regardless of its
    /// current size, and schedules the resulting flush job.
    pub fn flush(&self) -> Result<(), EngineError> {
        self.rotate()
    }

    /// Best-effort request to run a compaction pass. `begin`/`end` are
    /// accepted for API parity with range-oriented stores but are not
    /// consulted: the catalog's compaction policy always targets
    /// whichever level it currently picks (see
    /// [`VersionSet::pick_compaction_level`]).
    pub fn compact_range(&self, _begin: Option<&[u8]>, _end: Option<&[u8]>) -> Result<(), EngineError> {
        maybe_schedule_compaction(
            &self.0.worker,
            self.0.dir.clone(),
            self.0.version_set.clone(),
            self.0.open_table_cache.clone(),
            self.0.config.block_size,
            self.0.config.bloom_bits_per_key,
        )?;
        Ok(())
    }

    fn rotate(&self) -> Result<(), EngineError> {
        let (old_memtable, old_wal_path) = {
            let mut state = self
                .0
                .state
                .write()
                .map_err(|_| EngineError::Internal("engine state lock poisoned".into()))?;

            if state.immutable.is_some() {
                // Back-pressure-free by design: a rotation requested
                // while the single immutable slot is occupied is a
                // successful no-op.
                return Ok(());
            }

            let old_memtable = state.memtable.clone();
            let old_wal_path = state.wal.path().to_path_buf();

            state.memtable = Arc::new(Memtable::new());
            state.immutable = Some(old_memtable.clone());

            let new_wal_number = self.0.version_set.next_file_number()?;
            let new_wal_path = wal_segment_path(&self.0.dir, new_wal_number);
            state.wal = WalWriter::open(&new_wal_path)?;

            (old_memtable, old_wal_path)
        };

        let snapshot = old_memtable.snapshot_ordered()?;
        let flush_file_number = self.0.version_set.next_file_number()?;
        let job = build_flush_job(
            self.0.dir.clone(),
            flush_file_number,
            snapshot,
            self.0.version_set.clone(),
            old_wal_path,
            self.0.config.block_size,
            self.0.config.bloom_bits_per_key,
        );
        self.0.worker.submit(job)?;

        // The job owns its own copy of the snapshot; the immutable slot
        // can be released as soon as the job is handed off, even though
        // the job itself has not run yet.
        {
            let mut state = self
                .0
                .state
                .write()
                .map_err(|_| EngineError::Internal("engine state lock poisoned".into()))?;
            state.immutable = None;
        }

        self.compact_range(None, None)
    }
}

fn resolve_memtable_entry(
    entry: crate::memtable::MemtableEntry,
) -> Result<Vec<u8>, EngineError> {
    match entry.record_type {
        RecordType::Value => Ok(entry.value),
        RecordType::Deletion => Err(EngineError::NotFound("deleted".into())),
    }
}

fn wal_segment_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("wal-{number}.log"))
}

fn parse_wal_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("wal-")?.strip_suffix(".log")?.parse().ok()
}

fn recover_wal(dir: &Path, memtable: &Memtable, version_set: &VersionSet) -> Result<(), EngineError> {
    let mut segments: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(number) = parse_wal_file_name(name) {
            segments.push((number, path));
        }
    }
    segments.sort_by_key(|(number, _)| *number);

    for (number, path) in segments {
        version_set.observe_file_number(number)?;

        let mut reader = match WalReader::open(&path) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to open WAL segment during recovery, skipping");
                continue;
            }
        };

        let mut applied = 0usize;
        loop {
            match reader.read_record() {
                Ok(Some(record)) => {
                    memtable.add(record.key, record.value, record.record_type)?;
                    applied += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(path = %path.display(), %err, applied, "WAL segment replay stopped early");
                    break;
                }
            }
        }

        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), %err, "failed to delete replayed WAL segment");
        } else {
            info!(path = %path.display(), applied, "replayed and removed WAL segment");
        }
    }
    Ok(())
}
