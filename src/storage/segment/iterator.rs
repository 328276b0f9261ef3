//! Segment Iterator
//!
//! Sequential iteration over all entries in a segment.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::record::{Frame, RecordReader};

/// Iterator over segment entries in file (= ascending key) order
pub struct SegmentIterator {
    frames: RecordReader<BufReader<File>>,
    path: PathBuf,
    done: bool,
}

impl SegmentIterator {
    pub(super) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            frames: RecordReader::new(BufReader::new(file)),
            path: path.to_path_buf(),
            done: false,
        })
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.frames.next_frame() {
                Ok(Some(Frame::Record(record))) => return Some(Ok((record.key, record.value))),
                Ok(Some(Frame::Corrupt { offset, reason })) => {
                    warn!(segment = %self.path.display(), offset, %reason, "skipping corrupt segment record");
                }
                Ok(Some(Frame::Torn { offset })) => {
                    warn!(segment = %self.path.display(), offset, "segment ends in a partial record");
                    self.done = true;
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}
