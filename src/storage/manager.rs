//! Segment Store
//!
//! Manages the ordered list of segments and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing segments on startup
//! - Search segments newest → oldest for reads
//! - Create new segments from memtable flushes
//! - Swap compacted segments in for their inputs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{EmberError, Result};

use super::segment::{is_staging, parse_segment_id, segment_file_name, Segment, SegmentBuilder};

/// Ordered collection of segments, oldest first
///
/// ## Concurrency:
/// - Mutation needs `&mut self`; the engine provides the lock
/// - `next_segment_id`: atomic so ids can be allocated under a shared lock
/// - Segments are `Arc`ed so compaction can read a snapshot without a lock
pub struct SegmentStore {
    /// Directory where segments are stored
    dir: PathBuf,

    /// Open segments, ordered oldest → newest
    segments: Vec<Arc<Segment>>,

    /// Next ID for creating new segments
    next_segment_id: AtomicU64,

    bloom_false_positive_rate: f64,
}

impl SegmentStore {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove staging files left by an interrupted flush or compaction
    /// 3. Discover existing segment files
    /// 4. Open each in ascending id order (rebuilds filters and indexes)
    pub fn open(dir: &Path, bloom_false_positive_rate: f64) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            if is_staging(&path) {
                info!(path = %path.display(), "removing incomplete staged segment");
                fs::remove_file(&path)?;
                continue;
            }

            if let Some(id) = parse_segment_id(&path) {
                ids.push(id);
            }
        }

        // Creation order = id order
        ids.sort_unstable();

        let segments = ids
            .iter()
            .map(|&id| {
                Segment::open(&dir.join(segment_file_name(id)), id, bloom_false_positive_rate)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        // Next ID = max + 1, or 1 if no segments exist
        let next_id = ids.last().map(|&id| id + 1).unwrap_or(1);

        debug!(dir = %dir.display(), segments = segments.len(), next_id, "opened segment store");

        Ok(Self {
            dir: dir.to_path_buf(),
            segments,
            next_segment_id: AtomicU64::new(next_id),
            bloom_false_positive_rate,
        })
    }

    /// Get a value by key, searching segments newest → oldest.
    ///
    /// A segment whose filter rules the key out is skipped without I/O.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        for segment in self.segments.iter().rev() {
            if !segment.might_contain(key) {
                continue;
            }

            if let Some(value) = segment.get(key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Write sorted entries to a new segment and register it as newest
    pub fn flush<'a, I>(&mut self, entries: I) -> Result<Arc<Segment>>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let id = self.allocate_id();
        let segment = Arc::new(Self::write_segment(
            &self.dir,
            id,
            entries,
            self.bloom_false_positive_rate,
        )?);

        self.segments.push(Arc::clone(&segment));
        Ok(segment)
    }

    /// Write a complete, durable segment without registering it
    pub fn write_segment<'a, I>(
        dir: &Path,
        id: u64,
        entries: I,
        bloom_false_positive_rate: f64,
    ) -> Result<Segment>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let mut builder =
            SegmentBuilder::create(&dir.join(segment_file_name(id)), id, bloom_false_positive_rate)?;

        for (key, value) in entries {
            if let Err(e) = builder.add(key, value) {
                builder.abandon();
                return Err(e);
            }
        }

        builder.finish()
    }

    /// Current segments, oldest first
    pub fn snapshot(&self) -> Vec<Arc<Segment>> {
        self.segments.clone()
    }

    /// Reserve an id; later allocations always sort after it
    pub fn allocate_id(&self) -> u64 {
        self.next_segment_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Replace `inputs` with `output` and return the superseded files.
    ///
    /// `inputs` must still be the oldest segments in the store. Segments
    /// flushed after the snapshot stay behind the output, newest last.
    pub fn install_compacted(
        &mut self,
        inputs: &[Arc<Segment>],
        output: Segment,
    ) -> Result<Vec<PathBuf>> {
        let unchanged = self.segments.len() >= inputs.len()
            && self
                .segments
                .iter()
                .zip(inputs)
                .all(|(current, input)| Arc::ptr_eq(current, input));
        if !unchanged {
            return Err(EmberError::ConcurrentMutationConflict(
                "segment list changed while compaction was running".to_string(),
            ));
        }

        let newer = self.segments.split_off(inputs.len());
        let replaced = std::mem::replace(&mut self.segments, vec![Arc::new(output)]);
        self.segments.extend(newer);

        Ok(replaced
            .iter()
            .map(|segment| segment.path().to_path_buf())
            .collect())
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total bytes across segment files
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.file_size()).sum()
    }

    /// Get the data directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bloom_false_positive_rate(&self) -> f64 {
        self.bloom_false_positive_rate
    }

    /// Get the next segment ID (for testing/debugging)
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id.load(Ordering::SeqCst)
    }
}
