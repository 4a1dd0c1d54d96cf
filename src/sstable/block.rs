//! Data block encoding: the unit a [`super::SstableReader`] reads off disk
//! and linearly scans for a key.
//!
//! Wire format per entry: `varint(klen) | varint(vlen+1) | key | type_byte |
//! value`. The `+1` on the value length folds the type byte into the same
//! length field the original format uses, so a reader only ever does one
//! length-prefixed read per entry instead of two.

use crate::encoding::{get_varint_u32, put_varint_u32};
use crate::memtable::RecordType;

/// Accumulates entries for a single data block until it reaches its
/// target size.
pub struct DataBlockBuilder {
    target_size: usize,
    buf: Vec<u8>,
    first_key: Vec<u8>,
}

impl DataBlockBuilder {
    pub fn new(target_size: usize) -> Self {
        DataBlockBuilder {
            target_size,
            buf: Vec::new(),
            first_key: Vec::new(),
        }
    }

    /// Appends one entry. Callers must add keys in ascending order.
    pub fn add(&mut self, key: &[u8], record_type: RecordType, value: &[u8]) {
        if self.buf.is_empty() {
            self.first_key = key.to_vec();
        }
        put_varint_u32(&mut self.buf, key.len() as u32);
        put_varint_u32(&mut self.buf, value.len() as u32 + 1);
        self.buf.extend_from_slice(key);
        self.buf.push(record_type as u8);
        self.buf.extend_from_slice(value);
    }

    pub fn should_flush(&self) -> bool {
        self.buf.len() >= self.target_size
    }

    pub fn current_size(&self) -> usize {
        self.buf.len()
    }

    pub fn first_key(&self) -> &[u8] {
        &self.first_key
    }

    /// Takes the accumulated bytes, resetting the builder for the next
    /// block.
    pub fn finish(&mut self) -> Vec<u8> {
        self.first_key.clear();
        std::mem::take(&mut self.buf)
    }
}

/// One decoded entry from a data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub key: Vec<u8>,
    pub record_type: RecordType,
    pub value: Vec<u8>,
}

/// Sequential reader over a single data block's raw bytes.
pub struct DataBlockReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DataBlockReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DataBlockReader { data, pos: 0 }
    }

    /// Byte offset within the block the reader has consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decodes and returns the next entry, or `None` at the end of the
    /// block or upon hitting a malformed entry (treated as end-of-block,
    /// never as a hard error — the block's own checksum, verified by the
    /// caller before construction, already guards against corruption).
    pub fn next_entry(&mut self) -> Option<ParsedEntry> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let (klen, n1) = get_varint_u32(rest).ok()?;
        let (vlen_plus_one, n2) = get_varint_u32(&rest[n1..]).ok()?;
        let klen = klen as usize;
        let vlen = (vlen_plus_one as usize).checked_sub(1)?;
        let header = n1 + n2;
        if rest.len() < header + klen + 1 + vlen {
            return None;
        }
        let key = rest[header..header + klen].to_vec();
        let type_byte = rest[header + klen];
        let record_type = RecordType::from_byte(type_byte).ok()?;
        let value = rest[header + klen + 1..header + klen + 1 + vlen].to_vec();
        self.pos += header + klen + 1 + vlen;
        Some(ParsedEntry {
            key,
            record_type,
            value,
        })
    }
}

impl<'a> Iterator for DataBlockReader<'a> {
    type Item = ParsedEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
