//! Segment Reader
//!
//! Opens existing segment files and answers point lookups through the
//! sparse index.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::ops::Bound;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bloom::{BloomFilter, BloomFilterBuilder};
use crate::error::Result;
use crate::record::{Frame, RecordReader};

use super::{Segment, INDEX_INTERVAL};

impl Segment {
    /// Open a segment, rebuilding its bloom filter and sparse index with a
    /// single scan. Corrupt records are skipped; a partial final record
    /// ends the scan.
    pub fn open(path: &Path, id: u64, bloom_false_positive_rate: f64) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut frames = RecordReader::new(BufReader::new(file.try_clone()?));
        let mut bloom = BloomFilterBuilder::new(bloom_false_positive_rate);
        let mut index = BTreeMap::new();
        let mut entry_count = 0u64;
        let mut max_key = None;

        loop {
            let offset = frames.offset();
            match frames.next_frame()? {
                None => break,
                Some(Frame::Record(record)) => {
                    if entry_count % INDEX_INTERVAL == 0 {
                        index.insert(record.key.clone(), offset);
                    }
                    bloom.add_key(&record.key);
                    entry_count += 1;
                    max_key = Some(record.key);
                }
                Some(Frame::Corrupt { offset, reason }) => {
                    warn!(segment = %path.display(), offset, %reason, "skipping corrupt segment record");
                }
                Some(Frame::Torn { offset }) => {
                    warn!(segment = %path.display(), offset, "segment ends in a partial record");
                    break;
                }
            }
        }

        debug!(segment = %path.display(), entry_count, file_size, "opened segment");

        Ok(Self::from_parts(
            id,
            path,
            entry_count,
            file_size,
            max_key,
            bloom.build(),
            index,
            file,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn from_parts(
        id: u64,
        path: &Path,
        entry_count: u64,
        file_size: u64,
        max_key: Option<Vec<u8>>,
        bloom: BloomFilter,
        index: BTreeMap<Vec<u8>, u64>,
        file: File,
    ) -> Self {
        Self {
            id,
            path: path.to_path_buf(),
            entry_count,
            file_size,
            max_key,
            bloom,
            index,
            file: Mutex::new(BufReader::new(file)),
        }
    }

    /// Point lookup. Does not consult the bloom filter; callers that want
    /// to skip I/O check `might_contain` first.
    ///
    /// Seeks to the last indexed key <= `key` and scans forward until the
    /// key is found or passed.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let floor = self
            .index
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back();
        let start = match floor {
            Some((_, &offset)) => offset,
            None => return Ok(None),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(start))?;
        let mut frames = RecordReader::with_offset(&mut *file, start);

        while let Some(frame) = frames.next_frame()? {
            match frame {
                Frame::Record(record) => match record.key.as_slice().cmp(key) {
                    Ordering::Less => continue,
                    Ordering::Equal => return Ok(Some(record.value)),
                    Ordering::Greater => return Ok(None),
                },
                Frame::Corrupt { offset, reason } => {
                    warn!(segment = %self.path.display(), offset, %reason, "skipping corrupt segment record");
                }
                Frame::Torn { .. } => break,
            }
        }

        Ok(None)
    }
}
