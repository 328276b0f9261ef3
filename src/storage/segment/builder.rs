//! Segment Builder
//!
//! Writes sorted key-value entries to a new segment file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::bloom::BloomFilterBuilder;
use crate::error::{EmberError, Result};
use crate::record::encode_frame;

use super::{staging_path, sync_dir, Segment, INDEX_INTERVAL};

/// Builder for creating new segments from sorted entries
pub struct SegmentBuilder {
    id: u64,
    /// Final file path
    path: PathBuf,
    /// Where the bytes go until `finish()`
    staging_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    index: BTreeMap<Vec<u8>, u64>,
    last_key: Option<Vec<u8>>,
    bloom: BloomFilterBuilder,
}

impl SegmentBuilder {
    /// Start a segment that will live at `path` once finished.
    ///
    /// Call `add()` in strictly ascending key order, then `finish()`.
    pub fn create(path: &Path, id: u64, bloom_false_positive_rate: f64) -> Result<Self> {
        let staging_path = staging_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&staging_path)
            .map_err(|e| EmberError::durability("create segment", e))?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            staging_path,
            writer: BufWriter::new(file),
            entry_count: 0,
            current_offset: 0,
            index: BTreeMap::new(),
            last_key: None,
            bloom: BloomFilterBuilder::new(bloom_false_positive_rate),
        })
    }

    /// Add a key-value pair; keys must be strictly ascending
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(EmberError::Storage(format!(
                    "segment keys must be strictly ascending: {:?} after {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last)
                )));
            }
        }

        let frame = encode_frame(self.entry_count + 1, key, value)?;
        self.writer
            .write_all(&frame)
            .map_err(|e| EmberError::durability("write segment", e))?;

        if self.entry_count % INDEX_INTERVAL == 0 {
            self.index.insert(key.to_vec(), self.current_offset);
        }
        self.bloom.add_key(key);
        self.current_offset += frame.len() as u64;
        self.entry_count += 1;
        self.last_key = Some(key.to_vec());

        Ok(())
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Flush, fsync and rename the staged file into place, then open it
    ///
    /// On error neither the staged nor the final file is left behind, so a
    /// failed flush or compaction cannot resurface as a segment on restart.
    pub fn finish(self) -> Result<Segment> {
        let staging_path = self.staging_path.clone();
        let path = self.path.clone();
        let result = self.install();
        if result.is_err() {
            discard_outputs(&staging_path, &path);
        }
        result
    }

    /// Throw away a partially written segment
    pub fn abandon(self) {
        let staging_path = self.staging_path.clone();
        drop(self.writer);
        remove_if_present(&staging_path);
    }

    fn install(self) -> Result<Segment> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| EmberError::durability("flush segment", e.into_error()))?;
        file.sync_all()
            .map_err(|e| EmberError::durability("sync segment", e))?;
        drop(file);

        fs::rename(&self.staging_path, &self.path)
            .map_err(|e| EmberError::durability("install segment", e))?;
        if let Some(dir) = self.path.parent() {
            sync_dir(dir).map_err(|e| EmberError::durability("sync segment directory", e))?;
        }

        let file = File::open(&self.path)?;
        Ok(Segment::from_parts(
            self.id,
            &self.path,
            self.entry_count,
            self.current_offset,
            self.last_key,
            self.bloom.build(),
            self.index,
            file,
        ))
    }
}

/// Remove whichever of the two names holds the unfinished segment; the
/// rename may or may not have happened.
fn discard_outputs(staging_path: &Path, path: &Path) {
    remove_if_present(staging_path);
    remove_if_present(path);
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove unfinished segment"),
    }
}
