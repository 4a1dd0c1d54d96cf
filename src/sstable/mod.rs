//! Sorted String Table (SSTable) Module
//!
//! An immutable, disk-backed sorted file holding one flush's or one
//! compaction's worth of key-value data.
//!
//! # On-disk layout
//!
//! ```text
//! [data block]...
//! [sparse index block]
//! [bloom filter block]
//! [56-byte footer]
//! ```
//!
//! - **Data blocks** ([`block`]) — `varint(klen)|varint(vlen+1)|key|type_byte|value`
//!   entries, grouped into blocks of roughly [`DEFAULT_BLOCK_SIZE`] bytes.
//! - **Index block** ([`index_block`]) — one `(first_key, offset, size)`
//!   entry per data block, in ascending key order.
//! - **Bloom filter block** ([`bloom`]) — a single filter over every key
//!   in the table.
//! - **Footer** — fixed 56 bytes: `index_offset:u64 | index_size:u64 |
//!   filter_offset:u64 | filter_size:u64 | version:u32 | pad:u32 |
//!   magic:u64`.
//!
//! Once written, nothing about a table changes; readers never take a
//! lock on the file itself. [`SstableBuilder`] writes a table from a
//! sorted stream (a memtable snapshot or a merge of existing tables);
//! [`SstableReader`] opens one for point lookups and [`SstableIterator`]
//! scans.

pub mod block;
pub mod bloom;
pub mod builder;
pub mod index_block;
pub mod iterator;

#[cfg(test)]
mod tests;

pub use builder::{SstableBuilder, TableMeta};
pub use iterator::SstableIterator;

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

use crate::encoding::{Decode, Encode};
use crate::memtable::RecordType;
use bloom::BloomFilterReader;
use index_block::{IndexEntry, decode_index_block, find_block};

/// Magic trailer identifying a valid table footer.
pub const SSTABLE_MAGIC: u64 = 0xdb4775248b80fb57;
/// On-disk format version.
pub const SSTABLE_VERSION: u32 = 1;
/// Target uncompressed size of a single data block before it is flushed.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;
/// Bits-per-key used to size the Bloom filter, absent per-table tuning.
pub const DEFAULT_BLOOM_BITS_PER_KEY: u32 = 10;
/// Size in bytes of the fixed footer.
pub const FOOTER_SIZE: usize = 56;

/// Errors produced by SSTable build/read operations.
#[derive(Debug, Error)]
pub enum SstableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt table: {0}")]
    Corruption(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Decoded footer fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Footer {
    pub index_offset: u64,
    pub index_size: u64,
    pub filter_offset: u64,
    pub filter_size: u64,
}

impl Footer {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FOOTER_SIZE);
        let _ = self.index_offset.encode_to(&mut buf);
        let _ = self.index_size.encode_to(&mut buf);
        let _ = self.filter_offset.encode_to(&mut buf);
        let _ = self.filter_size.encode_to(&mut buf);
        let _ = SSTABLE_VERSION.encode_to(&mut buf);
        let _ = 0u32.encode_to(&mut buf); // pad
        let _ = SSTABLE_MAGIC.encode_to(&mut buf);
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self, SstableError> {
        if buf.len() < FOOTER_SIZE {
            return Err(SstableError::Corruption("footer too short".into()));
        }
        let mut pos = 0;
        let (index_offset, n) = u64::decode_from(&buf[pos..])?;
        pos += n;
        let (index_size, n) = u64::decode_from(&buf[pos..])?;
        pos += n;
        let (filter_offset, n) = u64::decode_from(&buf[pos..])?;
        pos += n;
        let (filter_size, n) = u64::decode_from(&buf[pos..])?;
        pos += n;
        let (version, n) = u32::decode_from(&buf[pos..])?;
        pos += n;
        pos += 4; // pad
        let (magic, _) = u64::decode_from(&buf[pos..])?;

        if magic != SSTABLE_MAGIC {
            return Err(SstableError::Corruption("bad magic".into()));
        }
        if version != SSTABLE_VERSION {
            return Err(SstableError::Corruption(format!(
                "unsupported table version {version}"
            )));
        }

        Ok(Footer {
            index_offset,
            index_size,
            filter_offset,
            filter_size,
        })
    }
}

impl From<crate::encoding::EncodingError> for SstableError {
    fn from(e: crate::encoding::EncodingError) -> Self {
        SstableError::Corruption(e.to_string())
    }
}

/// The result of a point lookup against a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableGetResult {
    Value(Vec<u8>),
    Deletion,
    NotFound,
}

/// A read-only handle on one table file, opened once and reused across
/// lookups.
pub struct SstableReader {
    path: std::path::PathBuf,
    file: File,
    footer: Footer,
    index: Vec<IndexEntry>,
    filter_block: Vec<u8>,
}

impl SstableReader {
    /// Opens `path`, loading its footer, index, and Bloom filter blocks
    /// into memory. Data blocks are read on demand.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SstableError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let file_len = file.metadata()?.len();
        if file_len < FOOTER_SIZE as u64 {
            return Err(SstableError::Corruption("file too small".into()));
        }

        file.seek(SeekFrom::Start(file_len - FOOTER_SIZE as u64))?;
        let mut footer_buf = [0u8; FOOTER_SIZE];
        file.read_exact(&mut footer_buf)?;
        let footer = Footer::decode(&footer_buf)?;

        let index_data = read_block_at(&mut file, footer.index_offset, footer.index_size)?;
        let index = decode_index_block(&index_data);

        let filter_block = read_block_at(&mut file, footer.filter_offset, footer.filter_size)?;

        Ok(SstableReader {
            path,
            file,
            footer,
            index,
            filter_block,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total size of the table file in bytes.
    pub fn file_size(&self) -> Result<u64, SstableError> {
        Ok(self.file.metadata()?.len())
    }

    /// A cache key uniquely identifying a data block inside this table,
    /// shared with [`crate::cache`].
    pub fn block_cache_key(&self, offset: u64) -> String {
        format!("{}:{offset}", self.path.display())
    }

    /// Looks up `key`, consulting the Bloom filter before touching any
    /// data block. Equivalent to [`Self::get_with_cache`] with no block
    /// cache.
    pub fn get(&mut self, key: &[u8]) -> Result<TableGetResult, SstableError> {
        self.get_with_cache(key, None, false)
    }

    /// Looks up `key`, consulting the Bloom filter before touching any
    /// data block, then binary-searching the index for the block that
    /// may hold it, then linearly scanning that block.
    ///
    /// `block_cache` is consulted for the matched block before issuing
    /// file I/O; on a miss, the block is read from disk and, when
    /// `fill_cache` is true, inserted into the cache for next time.
    pub fn get_with_cache(
        &mut self,
        key: &[u8],
        block_cache: Option<&crate::cache::BlockCache>,
        fill_cache: bool,
    ) -> Result<TableGetResult, SstableError> {
        let filter = BloomFilterReader::new(&self.filter_block);
        if !filter.key_may_match(key) {
            return Ok(TableGetResult::NotFound);
        }

        let Some(block_idx) = find_block(&self.index, key) else {
            return Ok(TableGetResult::NotFound);
        };
        let entry = &self.index[block_idx];
        let (offset, size) = (entry.offset, entry.size);

        let block_data = match block_cache {
            None => self.read_data_block(offset, size)?,
            Some(cache) => {
                let cache_key = self.block_cache_key(offset);
                match cache.get(&cache_key).map_err(|e| {
                    SstableError::Internal(format!("block cache error: {e}"))
                })? {
                    Some(cached) => cached,
                    None => {
                        let data = self.read_data_block(offset, size)?;
                        if fill_cache {
                            cache.put(cache_key, data.clone()).map_err(|e| {
                                SstableError::Internal(format!("block cache error: {e}"))
                            })?;
                        }
                        data
                    }
                }
            }
        };

        let mut reader = block::DataBlockReader::new(&block_data);
        for parsed in &mut reader {
            match parsed.key.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => {
                    return Ok(match parsed.record_type {
                        RecordType::Value => TableGetResult::Value(parsed.value),
                        RecordType::Deletion => TableGetResult::Deletion,
                    });
                }
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => continue,
            }
        }
        Ok(TableGetResult::NotFound)
    }

    /// Reads and returns one data block's raw bytes.
    pub fn read_data_block(&mut self, offset: u64, size: u64) -> Result<Vec<u8>, SstableError> {
        read_block_at(&mut self.file, offset, size)
    }

    pub(crate) fn index_entries(&self) -> &[IndexEntry] {
        &self.index
    }
}

fn read_block_at(file: &mut File, offset: u64, size: u64) -> Result<Vec<u8>, SstableError> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
