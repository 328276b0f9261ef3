//! Storage Module
//!
//! Persistent storage layer: immutable sorted segments.
//!
//! ## Responsibilities
//! - Persist flushed memtables as sorted segment files
//! - Point lookups newest → oldest, skipping segments via bloom filters
//! - Compaction of all segments into one
//! - Rediscover segment order from the directory listing on startup

pub mod compaction;
mod manager;
mod segment;

pub use compaction::CompactionStats;
pub use manager::SegmentStore;
pub use segment::{parse_segment_id, segment_file_name, Segment, SegmentBuilder, SegmentIterator};
