//! MemTable implementation
//!
//! Skip list plus approximate size accounting.

use super::skiplist::{SkipList, SkipListIter};

/// In-memory table for recent writes
pub struct MemTable {
    list: SkipList,
    /// Sum of key + value lengths over live entries
    size: usize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::from_list(SkipList::new())
    }

    /// MemTable with deterministic tower heights
    pub fn with_seed(seed: u64) -> Self {
        Self::from_list(SkipList::with_seed(seed))
    }

    fn from_list(list: SkipList) -> Self {
        Self { list, size: 0 }
    }

    /// Insert or overwrite a key. Returns the new approximate size.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let key_len = key.len();
        let value_len = value.len();

        match self.list.insert(key, value) {
            Some(old) => {
                self.size = self.size - old.len() + value_len;
            }
            None => {
                self.size += key_len + value_len;
            }
        }

        self.size
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.list.get(key)
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// True once either limit is strictly exceeded
    pub fn exceeds(&self, size_limit: usize, entry_limit: usize) -> bool {
        self.size > size_limit || self.entry_count() > entry_limit
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> SkipListIter<'_> {
        self.list.iter()
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&mut self) {
        self.list.clear();
        self.size = 0;
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
