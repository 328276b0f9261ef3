//! Compaction
//!
//! Merges every segment into one. Segments are replayed oldest to newest
//! into a merge map, so the newest value for each key wins, and the map is
//! written out in ascending key order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

use super::{Segment, SegmentStore};

/// Compaction statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub input_segments: usize,
    /// Records read across all inputs
    pub entries_read: u64,
    /// Distinct keys written to the output
    pub entries_written: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Last-write-wins merge of `inputs`, which must be ordered oldest first
pub fn merge_segments(inputs: &[Arc<Segment>]) -> Result<(BTreeMap<Vec<u8>, Vec<u8>>, u64)> {
    let mut merged = BTreeMap::new();
    let mut entries_read = 0u64;

    for segment in inputs {
        for entry in segment.iter()? {
            let (key, value) = entry?;
            merged.insert(key, value);
            entries_read += 1;
        }
    }

    Ok((merged, entries_read))
}

/// Merge `inputs` and write the result as segment `id` in `dir`.
///
/// The output is staged and fsynced before this returns; nothing is
/// registered or deleted.
pub fn compact_segments(
    inputs: &[Arc<Segment>],
    dir: &Path,
    id: u64,
    bloom_false_positive_rate: f64,
) -> Result<(Segment, CompactionStats)> {
    let (merged, entries_read) = merge_segments(inputs)?;

    let output = SegmentStore::write_segment(
        dir,
        id,
        merged.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
        bloom_false_positive_rate,
    )?;

    let stats = CompactionStats {
        input_segments: inputs.len(),
        entries_read,
        entries_written: output.entry_count(),
        bytes_before: inputs.iter().map(|s| s.file_size()).sum(),
        bytes_after: output.file_size(),
    };

    Ok((output, stats))
}
