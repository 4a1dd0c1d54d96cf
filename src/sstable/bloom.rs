//! Hand-rolled Bloom filter, one per table, checked before any data block
//! is read for a point lookup.
//!
//! Trailing byte layout: `bits... | k_byte`. `k` (the number of probes) is
//! derived from `bits_per_key` at build time and stored alongside the bit
//! array so a reader never needs to be told it out of band.
//!
//! Probe sequence: `h = fnv1a_64(key)`, `delta = h.rotate_right(17)`, then
//! `k` successive probes at `h % (len*8)`, `h += delta` between each. This
//! computes `delta` over the full 64-bit hash rather than narrowing to 32
//! bits first — see `DESIGN.md` for why that diverges from the reference
//! bit-for-bit and why it is still a correct instance of the same
//! algorithm family.

use crate::encoding::fnv1a_64;

const DEFAULT_BITS_PER_KEY: u32 = 10;

/// Accumulates keys for a single table's Bloom filter.
pub struct BloomFilterBuilder {
    bits_per_key: u32,
    keys: Vec<Vec<u8>>,
}

impl BloomFilterBuilder {
    pub fn new(bits_per_key: u32) -> Self {
        BloomFilterBuilder {
            bits_per_key,
            keys: Vec::new(),
        }
    }

    pub fn with_default_bits_per_key() -> Self {
        Self::new(DEFAULT_BITS_PER_KEY)
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.keys.push(key.to_vec());
    }

    /// Builds the final bit array with the trailing `k` byte.
    pub fn finish(self) -> Vec<u8> {
        let n = self.keys.len().max(1);
        let mut bits = (n as u64) * (self.bits_per_key as u64);
        if bits < 64 {
            bits = 64;
        }
        let byte_len = ((bits + 7) / 8) as usize;
        let mut data = vec![0u8; byte_len];

        let k = ((self.bits_per_key as f64) * 0.69) as u32;
        let k = k.clamp(1, 30);

        for key in &self.keys {
            let mut h = fnv1a_64(key);
            let delta = h.rotate_right(17);
            for _ in 0..k {
                let bit_pos = (h % (byte_len as u64 * 8)) as usize;
                data[bit_pos / 8] |= 1 << (bit_pos % 8);
                h = h.wrapping_add(delta);
            }
        }

        data.push(k as u8);
        data
    }
}

/// Tests Bloom filter membership against an already-loaded filter block.
pub struct BloomFilterReader<'a> {
    data: &'a [u8],
    k: u32,
}

impl<'a> BloomFilterReader<'a> {
    /// `contents` is the raw filter block including its trailing `k` byte.
    /// An empty or 1-byte block degrades to "always maybe present", same
    /// as a missing filter.
    pub fn new(contents: &'a [u8]) -> Self {
        if contents.len() < 2 {
            return BloomFilterReader { data: &[], k: 0 };
        }
        let (data, k_byte) = contents.split_at(contents.len() - 1);
        BloomFilterReader {
            data,
            k: k_byte[0] as u32,
        }
    }

    pub fn key_may_match(&self, key: &[u8]) -> bool {
        if self.data.is_empty() || self.k == 0 {
            return true;
        }
        let mut h = fnv1a_64(key);
        let delta = h.rotate_right(17);
        let nbits = (self.data.len() as u64) * 8;
        for _ in 0..self.k {
            let bit_pos = (h % nbits) as usize;
            if self.data[bit_pos / 8] & (1 << (bit_pos % 8)) == 0 {
                return false;
            }
            h = h.wrapping_add(delta);
        }
        true
    }
}
