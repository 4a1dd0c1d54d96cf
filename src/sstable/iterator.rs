//! Full-table scan, walking the index block in order and decoding each
//! data block as it is reached.

use super::block::{DataBlockReader, ParsedEntry};
use super::{SstableError, SstableReader};

/// Yields every entry in a table in ascending key order.
pub struct SstableIterator<'a> {
    reader: &'a mut SstableReader,
    block_idx: usize,
    current_block: Vec<u8>,
    pos_in_block: usize,
}

impl<'a> SstableIterator<'a> {
    pub fn new(reader: &'a mut SstableReader) -> Result<Self, SstableError> {
        let mut iter = SstableIterator {
            reader,
            block_idx: 0,
            current_block: Vec::new(),
            pos_in_block: 0,
        };
        iter.load_block(0)?;
        Ok(iter)
    }

    fn load_block(&mut self, idx: usize) -> Result<(), SstableError> {
        let entries = self.reader.index_entries();
        if idx >= entries.len() {
            self.current_block = Vec::new();
            self.pos_in_block = 0;
            return Ok(());
        }
        let (offset, size) = (entries[idx].offset, entries[idx].size);
        self.current_block = self.reader.read_data_block(offset, size)?;
        self.pos_in_block = 0;
        Ok(())
    }

    /// Decodes and returns the next entry, advancing across block
    /// boundaries as needed.
    pub fn next_entry(&mut self) -> Result<Option<ParsedEntry>, SstableError> {
        loop {
            if !self.current_block.is_empty() {
                let mut block_reader = DataBlockReader::new(&self.current_block[self.pos_in_block..]);
                if let Some(entry) = block_reader.next_entry() {
                    self.pos_in_block += block_reader.position();
                    return Ok(Some(entry));
                }
            }
            self.block_idx += 1;
            self.load_block(self.block_idx)?;
            if self.current_block.is_empty() {
                return Ok(None);
            }
        }
    }
}

impl Iterator for SstableIterator<'_> {
    type Item = Result<ParsedEntry, SstableError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
