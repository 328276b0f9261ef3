//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Upsert semantics: one entry per key
//! - Track size for flush triggers
//! - Ordered iteration for segment creation
//!
//! ## Data Structure Choice
//! A skip list over an index arena: O(log n) expected insert and lookup
//! without rebalancing, and level 0 doubles as the sorted flush order.
//! Synchronization is the engine's job; the memtable itself is a plain
//! `&mut self` structure.

mod skiplist;
mod table;

pub use skiplist::{SkipList, SkipListIter, MAX_HEIGHT};
pub use table::MemTable;
