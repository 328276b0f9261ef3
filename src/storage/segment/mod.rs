//! Segment Module
//!
//! Immutable on-disk sorted key-value files.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Record 1   [Seq: u64][CRC: u32][Len: u32][Body]         │
//! │ Record 2   ... ascending by key, Seq = ordinal from 1   │
//! │ ...                                                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Records use the same framing as the WAL. There is no header or footer:
//! the bloom filter and the sparse index are rebuilt by one scan when an
//! existing segment is opened, and produced on the fly when a new one is
//! written.
//!
//! New segments are staged as `<name>.tmp`, fsynced, then renamed into
//! place, so a file with the final name is always complete.

mod builder;
mod iterator;
mod reader;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::bloom::BloomFilter;

pub use builder::SegmentBuilder;
pub use iterator::SegmentIterator;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// One sparse index entry per this many records
pub(crate) const INDEX_INTERVAL: u64 = 16;

/// Suffix of a segment that is still being written
pub(crate) const STAGING_SUFFIX: &str = ".tmp";

// =============================================================================
// Segment Handle
// =============================================================================

/// An open, immutable segment with its filter and sparse index
pub struct Segment {
    id: u64,
    path: PathBuf,
    entry_count: u64,
    file_size: u64,
    /// Largest key (smallest is the first index key)
    max_key: Option<Vec<u8>>,
    bloom: BloomFilter,
    /// First key of every INDEX_INTERVAL-th record → file offset
    index: BTreeMap<Vec<u8>, u64>,
    /// Lookups seek this handle, so they serialize per segment
    file: Mutex<BufReader<File>>,
}

impl Segment {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.max_key.as_deref()
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Range check plus bloom filter. `false` means the key is definitely
    /// not in this segment and no I/O is needed.
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) if key >= min && key <= max => self.bloom.might_contain(key),
            _ => false,
        }
    }

    /// Sequential iterator over all records, on its own file handle
    pub fn iter(&self) -> crate::error::Result<SegmentIterator> {
        SegmentIterator::open(&self.path)
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("entry_count", &self.entry_count)
            .field("file_size", &self.file_size)
            .finish()
    }
}

// =============================================================================
// Path Helpers
// =============================================================================

/// "segment_000042.sst" for id 42
pub fn segment_file_name(id: u64) -> String {
    format!("segment_{:06}.sst", id)
}

/// "segment_000042.sst" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<u64> {
    if path.extension()? != "sst" {
        return None;
    }
    let name = path.file_stem()?.to_str()?;
    name.strip_prefix("segment_")?.parse().ok()
}

pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

pub(crate) fn is_staging(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with("segment_") && name.ends_with(STAGING_SUFFIX))
}

/// Make a rename inside `dir` durable
#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
