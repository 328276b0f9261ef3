//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::record::{Frame, Record, RecordReader};

/// Reads frames from the WAL file
pub struct WalReader {
    frames: RecordReader<BufReader<File>>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            frames: RecordReader::new(BufReader::new(file)),
        })
    }

    /// Read the next frame from the WAL
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next_frame()?)
    }

    /// Byte offset of the next frame
    pub fn offset(&self) -> u64 {
        self.frames.offset()
    }

    /// Iterate over all valid records, skipping corrupt ones and stopping at
    /// a torn tail
    pub fn records(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over valid WAL records
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.reader.next_frame() {
                Ok(Some(Frame::Record(record))) => return Some(Ok(record)),
                Ok(Some(Frame::Corrupt { offset, reason })) => {
                    warn!(offset, %reason, "skipping corrupt WAL record");
                }
                Ok(Some(Frame::Torn { .. })) | Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
