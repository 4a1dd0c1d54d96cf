//! Sparse index block: one entry per data block, carrying that block's
//! first key plus its `(offset, size)` on disk.
//!
//! Wire format per entry: `varint(klen) | key | u64_offset_le |
//! u64_size_le`.

use crate::encoding::{Decode, Encode, get_varint_u32, put_varint_u32};

/// One sparse index entry: `separator_key` is the first key stored in the
/// referenced data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub separator_key: Vec<u8>,
    pub offset: u64,
    pub size: u64,
}

/// Accumulates index entries in ascending key order while a table is
/// being built.
#[derive(Default)]
pub struct IndexBlockBuilder {
    buf: Vec<u8>,
}

impl IndexBlockBuilder {
    pub fn new() -> Self {
        IndexBlockBuilder::default()
    }

    pub fn add(&mut self, key: &[u8], offset: u64, size: u64) {
        put_varint_u32(&mut self.buf, key.len() as u32);
        self.buf.extend_from_slice(key);
        let _ = offset.encode_to(&mut self.buf);
        let _ = size.encode_to(&mut self.buf);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Decodes a whole index block up front; tables rarely have more than a
/// few thousand blocks, so this is cheap compared to the data it indexes.
pub fn decode_index_block(data: &[u8]) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let Ok((klen, n)) = get_varint_u32(&data[pos..]) else {
            break;
        };
        pos += n;
        let klen = klen as usize;
        if data.len() < pos + klen + 16 {
            break;
        }
        let separator_key = data[pos..pos + klen].to_vec();
        pos += klen;
        let Ok((offset, n)) = u64::decode_from(&data[pos..]) else {
            break;
        };
        pos += n;
        let Ok((size, n)) = u64::decode_from(&data[pos..]) else {
            break;
        };
        pos += n;
        entries.push(IndexEntry {
            separator_key,
            offset,
            size,
        });
    }
    entries
}

/// Finds the index of the data block that may contain `key`: the last
/// entry whose separator key is `<= key`, matching the builder's
/// invariant that each block's separator is its first (smallest) key.
pub fn find_block(entries: &[IndexEntry], key: &[u8]) -> Option<usize> {
    if entries.is_empty() {
        return None;
    }
    match entries.binary_search_by(|e| e.separator_key.as_slice().cmp(key)) {
        Ok(i) => Some(i),
        Err(0) => None,
        Err(i) => Some(i - 1),
    }
}
