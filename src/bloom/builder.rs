use xxhash_rust::xxh3::xxh3_128;

use super::BloomFilter;

/// Collects key hashes while a segment is written or scanned, then sizes
/// the filter for the exact key count once it is known.
pub struct BloomFilterBuilder {
    hashes: Vec<u128>,
    false_positive_rate: f64,
}

impl BloomFilterBuilder {
    pub fn new(false_positive_rate: f64) -> Self {
        Self {
            hashes: Vec::new(),
            false_positive_rate,
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.hashes.push(xxh3_128(key));
    }

    pub fn key_count(&self) -> usize {
        self.hashes.len()
    }

    pub fn build(self) -> BloomFilter {
        let mut filter = BloomFilter::new(self.hashes.len(), self.false_positive_rate);
        for hash in self.hashes {
            filter.add_hash(hash);
        }
        filter
    }
}
