//! Builds a single table file from a sorted stream of entries.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::block::DataBlockBuilder;
use super::bloom::BloomFilterBuilder;
use super::index_block::IndexBlockBuilder;
use super::{DEFAULT_BLOCK_SIZE, DEFAULT_BLOOM_BITS_PER_KEY, Footer, SstableError};
use crate::memtable::RecordType;

/// Summary returned once a table has been fully written, enough for the
/// caller to register it with the version set.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub path: PathBuf,
    pub smallest_key: Vec<u8>,
    pub largest_key: Vec<u8>,
    pub file_size: u64,
    pub num_entries: u64,
}

/// Accumulates entries in ascending key order and writes them to a table
/// file on [`Self::finish`].
///
/// Callers must present keys in strictly ascending order — `add` does not
/// itself deduplicate or sort.
pub struct SstableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
    data_block: DataBlockBuilder,
    index: IndexBlockBuilder,
    filter: BloomFilterBuilder,
    pending_index_key: Vec<u8>,
    smallest_key: Option<Vec<u8>>,
    largest_key: Vec<u8>,
    num_entries: u64,
}

impl SstableBuilder {
    /// Creates (truncating if present) the file at `path` and prepares to
    /// receive entries.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SstableError> {
        Self::create_with_options(path, DEFAULT_BLOCK_SIZE, DEFAULT_BLOOM_BITS_PER_KEY)
    }

    pub fn create_with_options<P: AsRef<Path>>(
        path: P,
        block_size: usize,
        bloom_bits_per_key: u32,
    ) -> Result<Self, SstableError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(SstableBuilder {
            path,
            writer: BufWriter::new(file),
            offset: 0,
            data_block: DataBlockBuilder::new(block_size),
            index: IndexBlockBuilder::new(),
            filter: BloomFilterBuilder::new(bloom_bits_per_key),
            pending_index_key: Vec::new(),
            smallest_key: None,
            largest_key: Vec::new(),
            num_entries: 0,
        })
    }

    /// Appends one entry. `key` must be strictly greater than every key
    /// added so far.
    pub fn add(
        &mut self,
        key: &[u8],
        record_type: RecordType,
        value: &[u8],
    ) -> Result<(), SstableError> {
        if self.smallest_key.is_none() {
            self.smallest_key = Some(key.to_vec());
        }
        self.largest_key = key.to_vec();
        if self.data_block.current_size() == 0 {
            self.pending_index_key = key.to_vec();
        }

        self.data_block.add(key, record_type, value);
        self.filter.add_key(key);
        self.num_entries += 1;

        if self.data_block.should_flush() {
            self.flush_data_block()?;
        }
        Ok(())
    }

    fn flush_data_block(&mut self) -> Result<(), SstableError> {
        let block = self.data_block.finish();
        if block.is_empty() {
            return Ok(());
        }
        let off = self.offset;
        self.writer.write_all(&block)?;
        self.offset += block.len() as u64;
        self.index.add(&self.pending_index_key, off, block.len() as u64);
        Ok(())
    }

    /// Flushes the trailing data block, writes the index, Bloom filter,
    /// and footer, and returns the finished table's metadata.
    pub fn finish(mut self) -> Result<TableMeta, SstableError> {
        if self.data_block.current_size() > 0 {
            self.flush_data_block()?;
        }

        let index_data = self.index.finish();
        let index_offset = self.offset;
        self.writer.write_all(&index_data)?;
        self.offset += index_data.len() as u64;

        let filter_data = self.filter.finish();
        let filter_offset = self.offset;
        self.writer.write_all(&filter_data)?;
        self.offset += filter_data.len() as u64;

        let footer = Footer {
            index_offset,
            index_size: index_data.len() as u64,
            filter_offset,
            filter_size: filter_data.len() as u64,
        };
        let footer_bytes = footer.encode();
        self.writer.write_all(&footer_bytes)?;
        self.offset += footer_bytes.len() as u64;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        debug!(
            path = %self.path.display(),
            entries = self.num_entries,
            size = self.offset,
            "sstable finished"
        );

        Ok(TableMeta {
            path: self.path,
            smallest_key: self.smallest_key.unwrap_or_default(),
            largest_key: self.largest_key,
            file_size: self.offset,
            num_entries: self.num_entries,
        })
    }
}
