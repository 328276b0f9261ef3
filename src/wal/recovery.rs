//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.
//!
//! A frame cut short by end-of-file is the expected residue of a crash
//! mid-append and is truncated away without complaint. The same goes for a
//! complete but undecodable frame when it is the last one in the file.
//!
//! Damage with valid frames after it is skipped and reported. A damaged
//! length field makes the frame look longer than it is, so after any bad
//! frame the scan searches forward for the next checksum-valid frame and
//! only treats the damage as a tail when none exists.

use std::fs::{self, OpenOptions};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{EmberError, Result};
use crate::record::{find_frame, Frame, Record, RecordReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Detect and skip corrupted entries
    /// 3. Truncate partial writes at end
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<Record>, RecoveryResult)> {
        let (records, result, valid_len) = Self::scan(path)?;

        if result.was_truncated {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| EmberError::durability("open WAL for truncation", e))?;
            file.set_len(valid_len)
                .and_then(|_| file.sync_all())
                .map_err(|e| EmberError::durability("truncate torn WAL tail", e))?;
            debug!(valid_len, "truncated torn WAL tail");
        }

        Ok((records, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path)?.1)
    }

    /// Returns the records, the stats and the length of the retained prefix
    fn scan(path: &Path) -> Result<(Vec<Record>, RecoveryResult, u64)> {
        let data = fs::read(path)?;
        let mut records = Vec::new();
        let mut result = RecoveryResult::default();
        let mut valid_len = 0;
        let mut pos = 0;

        loop {
            let mut frames = RecordReader::with_offset(&data[pos..], pos as u64);

            // Read until the first frame that does not decode
            let damaged = loop {
                match frames.next_frame()? {
                    None => break None,
                    Some(Frame::Record(record)) => {
                        result.entries_recovered += 1;
                        result.last_lsn = result.last_lsn.max(record.seq);
                        records.push(record);
                        valid_len = frames.offset();
                    }
                    Some(Frame::Corrupt { offset, reason }) => break Some((offset, reason)),
                    Some(Frame::Torn { offset }) => {
                        break Some((offset, "frame runs past end of file".to_string()))
                    }
                }
            };

            let (offset, reason) = match damaged {
                Some(damaged) => damaged,
                None => break,
            };

            // The length field may be the damaged part, so look for the next
            // real frame instead of trusting it
            match find_frame(&data, offset as usize + 1) {
                Some(next) => {
                    warn!(
                        offset,
                        skipped_bytes = (next as u64 - offset),
                        %reason,
                        "skipping corrupt WAL record"
                    );
                    result.entries_corrupted += 1;
                    pos = next;
                }
                None => {
                    debug!(offset, %reason, "dropping incomplete WAL tail");
                    result.was_truncated = true;
                    valid_len = offset;
                    break;
                }
            }
        }

        Ok((records, result, valid_len))
    }
}
