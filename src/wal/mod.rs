//! Write-Ahead Logging (WAL) Module
//!
//! An append-only, crash-recoverable log of `(type, key, value)` records,
//! used to recover recent writes that have not yet been flushed to an
//! SSTable.
//!
//! # On-disk layout
//!
//! Each record is framed as:
//!
//! ```text
//! [varint payload_len][payload][fixed u32 checksum]
//! payload = [varint type][varint klen][varint vlen][key bytes][value bytes]
//! ```
//!
//! The checksum is an FNV-1a 64-bit hash of the payload bytes only
//! (truncated to its low 32 bits), not the length prefix — see
//! [`crate::encoding::fnv1a_64`]. The length-prefix-then-payload-then-
//! checksum ordering is load-bearing: a crash mid-write leaves either a
//! readable prefix of complete records or a dangling, detectably-short
//! tail, never a record whose checksum silently validates garbage.
//!
//! # Concurrency model
//!
//! The writer is shared via `Arc<Mutex<File>>` so foreground writers and
//! the background worker (which only ever reads a sealed, rotated-away
//! segment) can coexist. [`WalReader`] streams records sequentially and
//! stops — without erroring — at the first malformed, truncated, or
//! checksum-failing frame; everything decoded before that point is kept.

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;

use crate::encoding::{fnv1a_64, get_varint_u32, put_varint_u32};
use crate::memtable::{MemtableError, RecordType};

/// Errors produced by [`WalWriter`] and [`WalReader`] operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A decoded record carried an unrecognized type byte.
    #[error("memtable record error: {0}")]
    Record(#[from] MemtableError),

    /// The writer's lock was poisoned by a panicking holder.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A single decoded WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// `Value` or `Deletion`.
    pub record_type: RecordType,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

fn encode_frame(record_type: RecordType, key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(key.len() + value.len() + 8);
    put_varint_u32(&mut payload, record_type as u32);
    put_varint_u32(&mut payload, key.len() as u32);
    put_varint_u32(&mut payload, value.len() as u32);
    payload.extend_from_slice(key);
    payload.extend_from_slice(value);

    let checksum = fnv1a_64(&payload) as u32;

    let mut frame = Vec::with_capacity(payload.len() + 9);
    put_varint_u32(&mut frame, payload.len() as u32);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&checksum.to_le_bytes());
    frame
}

/// Appends framed records to a single WAL segment.
pub struct WalWriter {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl WalWriter {
    /// Opens (creating if absent) the WAL segment at `path` for appending.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(WalWriter {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Appends one record. When `sync` is true, the underlying file is
    /// fsync'd after the write; otherwise only a stream flush occurs.
    pub fn append(
        &self,
        record_type: RecordType,
        key: &[u8],
        value: &[u8],
        sync: bool,
    ) -> Result<(), WalError> {
        let frame = encode_frame(record_type, key, value);
        let mut file = self
            .file
            .lock()
            .map_err(|_| WalError::Internal("WAL writer lock poisoned".into()))?;
        file.write_all(&frame)?;
        file.flush()?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// The path of the segment this writer appends to, exposed so the
    /// caller can delete it once its contents are durably flushed.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Streams decoded records from a WAL segment in physical file order.
pub struct WalReader {
    file: File,
}

impl WalReader {
    /// Opens the WAL segment at `path` for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(WalReader { file })
    }

    /// Reads the next record, returning `Ok(None)` at a clean end of
    /// file or at the first malformed/truncated/checksum-failing frame.
    /// The latter case is not an error: it signals "stop replaying this
    /// segment", matching §4.1's "does not fail the entire recovery"
    /// contract. The byte offset at which parsing stopped is logged.
    pub fn read_record(&mut self) -> Result<Option<WalRecord>, WalError> {
        let start_offset = self.file.stream_position()?;

        let len = match self.read_varint_u32_from_stream()? {
            Some(len) => len,
            None => return Ok(None),
        };

        let mut payload = vec![0u8; len as usize];
        if let Err(err) = self.file.read_exact(&mut payload) {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                warn!(offset = start_offset, "WAL: truncated record payload");
                return Ok(None);
            }
            return Err(err.into());
        }

        let mut checksum_bytes = [0u8; 4];
        if let Err(err) = self.file.read_exact(&mut checksum_bytes) {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                warn!(offset = start_offset, "WAL: truncated record checksum");
                return Ok(None);
            }
            return Err(err.into());
        }
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = fnv1a_64(&payload) as u32;
        if stored_checksum != computed_checksum {
            warn!(offset = start_offset, "WAL: checksum mismatch, stopping replay");
            return Ok(None);
        }

        let (type_tag, mut pos) = match get_varint_u32(&payload) {
            Ok(v) => v,
            Err(_) => {
                warn!(offset = start_offset, "WAL: malformed record header");
                return Ok(None);
            }
        };
        let (klen, consumed) = match get_varint_u32(&payload[pos..]) {
            Ok(v) => v,
            Err(_) => {
                warn!(offset = start_offset, "WAL: malformed record header");
                return Ok(None);
            }
        };
        pos += consumed;
        let (vlen, consumed) = match get_varint_u32(&payload[pos..]) {
            Ok(v) => v,
            Err(_) => {
                warn!(offset = start_offset, "WAL: malformed record header");
                return Ok(None);
            }
        };
        pos += consumed;

        let klen = klen as usize;
        let vlen = vlen as usize;
        if payload.len() < pos + klen + vlen {
            warn!(offset = start_offset, "WAL: record header/body length mismatch");
            return Ok(None);
        }

        let record_type = match RecordType::from_byte(type_tag as u8) {
            Ok(t) => t,
            Err(_) => {
                warn!(offset = start_offset, "WAL: unrecognized record type byte");
                return Ok(None);
            }
        };

        let key = payload[pos..pos + klen].to_vec();
        let value = payload[pos + klen..pos + klen + vlen].to_vec();

        Ok(Some(WalRecord {
            record_type,
            key,
            value,
        }))
    }

    /// Reads a varint-encoded `u32` directly from the file stream,
    /// byte-at-a-time, returning `None` on a clean EOF before any byte
    /// is read (distinct from a truncated-mid-varint EOF, which is also
    /// treated as "stop replaying" but logged).
    fn read_varint_u32_from_stream(&mut self) -> Result<Option<u32>, WalError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        let mut first_byte = true;
        loop {
            let mut byte = [0u8; 1];
            let n = self.file.read(&mut byte)?;
            if n == 0 {
                if !first_byte {
                    warn!("WAL: truncated length varint");
                }
                return Ok(None);
            }
            first_byte = false;
            if shift > 28 {
                warn!("WAL: length varint too long");
                return Ok(None);
            }
            if byte[0] & 0x80 != 0 {
                result |= ((byte[0] & 0x7F) as u32) << shift;
            } else {
                result |= (byte[0] as u32) << shift;
                return Ok(Some(result));
            }
            shift += 7;
        }
    }

    /// Consumes the reader, collecting every successfully decoded
    /// record in physical file order.
    pub fn replay_all(mut self) -> Result<Vec<WalRecord>, WalError> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Rewinds the reader to the start of the segment.
    pub fn rewind(&mut self) -> Result<(), WalError> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}
