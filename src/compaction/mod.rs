//! Compaction Module
//!
//! Owns the single background worker thread and the two job kinds it
//! drains from its task queue:
//!
//! - **Flush job** — writes an immutable memtable's snapshot to a new
//!   level-0 table file, registers it with the version set, then deletes
//!   the WAL segment it superseded.
//! - **Compaction job** — merges one level's files (plus any overlapping
//!   files at the next level) into a single new table one level deeper,
//!   via the k-way merger ([`merge`]), then atomically swaps the inputs
//!   for the output in the version set and deletes the input files.
//!
//! Background job failures are logged and swallowed: the version set is
//! left untouched (or only partially advanced, if it reached the swap
//! step) and a subsequent scheduling attempt retries from the current
//! catalog state.

pub mod merge;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheError, OpenTableCache};
use crate::memtable::RecordType;
use crate::sstable::{SstableBuilder, SstableError, SstableIterator, SstableReader};
use crate::version::{TableFile, VersionError, VersionSet, table_file_name};

pub use merge::{KWayMerger, MergeSource};

/// Errors produced while running a flush or compaction job.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Table(#[from] SstableError),

    #[error("version set error: {0}")]
    Version(#[from] VersionError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// One unit of background work. Must be `Send` so it can cross the
/// channel to the worker thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A single background worker thread draining a FIFO task queue.
///
/// Dropping the worker closes the channel (no more tasks are accepted),
/// discards anything still queued, and joins the thread — the task it
/// was already running when shutdown began runs to completion first.
pub struct Worker {
    sender: Option<Sender<Task>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawns the background thread.
    pub fn start() -> Self {
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = unbounded();
        let handle = std::thread::spawn(move || {
            while let Ok(task) = receiver.recv() {
                task();
            }
        });
        Worker {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Enqueues `task` for the background thread to run.
    pub fn submit(&self, task: Task) -> Result<(), CompactionError> {
        match &self.sender {
            Some(sender) => sender
                .send(task)
                .map_err(|_| CompactionError::Internal("worker queue is closed".into())),
            None => Err(CompactionError::Internal("worker is shutting down".into())),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Drop the sender first so `receiver.recv()` returns `Err` once
        // the in-flight task (if any) finishes, instead of blocking
        // forever on an empty-but-open channel.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Flush job
// ------------------------------------------------------------------------------------------------

/// Builds the flush job closure: write `snapshot` to a new level-0 table
/// at `file_number`, register it with `version_set`, then delete
/// `old_wal_path`.
pub fn build_flush_job(
    dir: PathBuf,
    file_number: u64,
    snapshot: Vec<(Vec<u8>, RecordType, Vec<u8>)>,
    version_set: Arc<VersionSet>,
    old_wal_path: PathBuf,
    block_size: usize,
    bloom_bits_per_key: u32,
) -> Task {
    Box::new(move || {
        if let Err(err) = run_flush_job(
            &dir,
            file_number,
            &snapshot,
            &version_set,
            &old_wal_path,
            block_size,
            bloom_bits_per_key,
        ) {
            warn!(%err, file_number, "flush job failed; old WAL retained for next recovery");
        }
    })
}

fn run_flush_job(
    dir: &Path,
    file_number: u64,
    snapshot: &[(Vec<u8>, RecordType, Vec<u8>)],
    version_set: &VersionSet,
    old_wal_path: &Path,
    block_size: usize,
    bloom_bits_per_key: u32,
) -> Result<(), CompactionError> {
    let path = dir.join(table_file_name(0, file_number));
    let mut builder = SstableBuilder::create_with_options(&path, block_size, bloom_bits_per_key)?;
    for (key, record_type, value) in snapshot {
        builder.add(key, *record_type, value)?;
    }
    let meta = builder.finish()?;

    version_set.add_file(TableFile {
        level: 0,
        file_number,
        path: path.clone(),
        smallest_key: meta.smallest_key,
        largest_key: meta.largest_key,
        file_size: meta.file_size,
    })?;

    std::fs::remove_file(old_wal_path)?;
    info!(file_number, path = %path.display(), "flush job committed");
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Compaction job
// ------------------------------------------------------------------------------------------------

/// If the version set's simple level-0-file-count policy picks a level,
/// enqueues a compaction job for it. A no-op (returns `Ok(())`) when
/// there is nothing to compact.
pub fn maybe_schedule_compaction(
    worker: &Worker,
    dir: PathBuf,
    version_set: Arc<VersionSet>,
    open_table_cache: Arc<OpenTableCache>,
    block_size: usize,
    bloom_bits_per_key: u32,
) -> Result<(), CompactionError> {
    let Some(level) = version_set.pick_compaction_level()? else {
        return Ok(());
    };
    let task = build_compaction_job(
        dir,
        level,
        version_set,
        open_table_cache,
        block_size,
        bloom_bits_per_key,
    );
    worker.submit(task)
}

/// Builds the compaction job closure for `level`.
pub fn build_compaction_job(
    dir: PathBuf,
    level: usize,
    version_set: Arc<VersionSet>,
    open_table_cache: Arc<OpenTableCache>,
    block_size: usize,
    bloom_bits_per_key: u32,
) -> Task {
    Box::new(move || {
        if let Err(err) = run_compaction_job(
            &dir,
            level,
            &version_set,
            &open_table_cache,
            block_size,
            bloom_bits_per_key,
        ) {
            warn!(%err, level, "compaction job failed; inputs remain on disk for retry");
        }
    })
}

fn run_compaction_job(
    dir: &Path,
    level: usize,
    version_set: &VersionSet,
    open_table_cache: &OpenTableCache,
    block_size: usize,
    bloom_bits_per_key: u32,
) -> Result<(), CompactionError> {
    let (l, n) = version_set.pick_compaction_inputs(level)?;
    if l.is_empty() {
        return Ok(());
    }
    let inputs: Vec<TableFile> = l.into_iter().chain(n).collect();

    let mut readers: Vec<SstableReader> = Vec::with_capacity(inputs.len());
    for file in &inputs {
        readers.push(SstableReader::open(&file.path)?);
    }

    let mut sources = Vec::with_capacity(readers.len());
    for (reader, file) in readers.iter_mut().zip(inputs.iter()) {
        let iter = SstableIterator::new(reader)?;
        sources.push(MergeSource::new(iter, file.level, file.file_number));
    }

    let out_level = level + 1;
    let out_number = version_set.next_file_number()?;
    let out_path = dir.join(table_file_name(out_level, out_number));
    let mut builder = SstableBuilder::create_with_options(&out_path, block_size, bloom_bits_per_key)?;

    let mut merger = KWayMerger::new(sources);
    let mut wrote_any = false;
    while let Some((key, record_type, value)) = merger.next_entry()? {
        builder.add(&key, record_type, &value)?;
        wrote_any = true;
    }
    drop(merger);
    drop(readers);

    let added = if wrote_any {
        let meta = builder.finish()?;
        Some(TableFile {
            level: out_level,
            file_number: out_number,
            path: out_path.clone(),
            smallest_key: meta.smallest_key,
            largest_key: meta.largest_key,
            file_size: meta.file_size,
        })
    } else {
        drop(builder);
        let _ = std::fs::remove_file(&out_path);
        None
    };

    let removed: Vec<(usize, u64)> = inputs.iter().map(|f| (f.level, f.file_number)).collect();
    version_set.install_compaction_result(&removed, added)?;

    for file in &inputs {
        open_table_cache.erase(&file.path)?;
        if let Err(err) = std::fs::remove_file(&file.path) {
            warn!(path = %file.path.display(), %err, "failed to delete compacted input file");
        }
    }

    info!(
        level,
        out_level,
        inputs = inputs.len(),
        wrote_any,
        "compaction job committed"
    );
    Ok(())
}
