//! Bloom Filter Module
//!
//! Probabilistic set membership, one filter per segment.
//!
//! - If any probed bit is 0 → key is DEFINITELY NOT in the set
//! - If all probed bits are 1 → key is PROBABLY in the set
//!
//! ## Sizing
//! ```text
//! bits_per_key = -1.44 * log2(fpr)
//! num_hashes   = ceil(bits_per_key * ln 2)
//!
//!   1% FPR   → ~10 bits/key, 7 hashes
//!   0.1% FPR → ~14 bits/key, 10 hashes
//! ```
//!
//! The k probe positions come from double hashing one 128-bit xxh3 hash:
//! `h_i = h1 + i * h2 (mod m)`, with h1/h2 the two 64-bit halves.

mod builder;

pub use builder::BloomFilterBuilder;

use xxhash_rust::xxh3::xxh3_128;

/// Smallest filter we allocate, regardless of key count
const MIN_BITS: u64 = 64;

/// Fixed-size bloom filter over a segment's key set
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Create a filter sized for `expected_items` keys at the given false
    /// positive rate. An `expected_items` of zero is treated as one.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let (num_bits, num_hashes) = Self::optimal_params(expected_items, false_positive_rate);
        Self::with_params(num_bits, num_hashes)
    }

    /// Create a filter with explicit parameters.
    ///
    /// `num_hashes = 1` gives the single-hash baseline. Its false positive
    /// rate is materially higher than the multi-hash filter of the same size
    /// and it is only useful as a point of comparison.
    pub fn with_params(num_bits: u64, num_hashes: u32) -> Self {
        let num_bits = num_bits.max(MIN_BITS);
        let num_hashes = num_hashes.max(1);
        let words = ((num_bits + 63) / 64) as usize;

        Self {
            bits: vec![0u64; words],
            num_bits,
            num_hashes,
        }
    }

    /// (num_bits, num_hashes) for a key count and target rate
    pub fn optimal_params(expected_items: usize, false_positive_rate: f64) -> (u64, u32) {
        let items = expected_items.max(1) as f64;
        let bits_per_key = -1.44 * false_positive_rate.log2();

        let num_bits = ((items * bits_per_key).ceil() as u64).max(MIN_BITS);
        let num_hashes = ((bits_per_key * std::f64::consts::LN_2).ceil() as u32).max(1);
        (num_bits, num_hashes)
    }

    /// Record a key in the filter
    pub fn add(&mut self, key: &[u8]) {
        self.add_hash(xxh3_128(key));
    }

    /// Check if a key MIGHT be in the set.
    /// false → definitely not here. true → probably here.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = split(xxh3_128(key));
        (0..self.num_hashes).all(|i| self.check_bit(self.position(h1, h2, i)))
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub(crate) fn add_hash(&mut self, hash: u128) {
        let (h1, h2) = split(hash);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.set_bit(pos);
        }
    }

    fn position(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits
    }

    fn set_bit(&mut self, pos: u64) {
        self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
    }

    fn check_bit(&self, pos: u64) -> bool {
        (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
    }
}

fn split(hash: u128) -> (u64, u64) {
    (hash as u64, (hash >> 64) as u64)
}
