//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::WalSyncStrategy;
use crate::error::{EmberError, Result};
use crate::record::encode_frame;

use super::WalRecovery;

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN handed to the next append
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Appends written since the last fsync
    unsynced: usize,
    /// Bytes in the file, all of them complete frames
    len: u64,
}

impl WalWriter {
    /// Open or create a WAL file.
    ///
    /// LSNs resume after the last valid record already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn + 1
        } else {
            1
        };

        Self::resume(path, sync_strategy, next_lsn)
    }

    /// Open or create a WAL file whose contents were already scanned, e.g. by
    /// `WalRecovery::recover`. The next append receives `next_lsn`.
    pub fn resume(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EmberError::durability("open WAL", e))?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn,
            sync_strategy,
            unsynced: 0,
            len,
        })
    }

    /// Append a put to the WAL and return its LSN.
    ///
    /// Under `EveryWrite` the record is on stable storage when this returns.
    /// On error the frame is cut back off the file and no state advances, so
    /// a rejected put is never replayed.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, key, value)?;

        if let Err(e) = self.file.write_all(&frame) {
            self.discard_unacknowledged();
            return Err(EmberError::durability("append to WAL", e));
        }

        let sync_due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count,
        };
        if sync_due {
            if let Err(e) = self.file.sync_data() {
                self.discard_unacknowledged();
                return Err(EmberError::durability("sync WAL", e));
            }
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }

        self.len += frame.len() as u64;
        self.next_lsn += 1;

        Ok(lsn)
    }

    /// Trim anything written past the last acknowledged append
    fn discard_unacknowledged(&mut self) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!(error = %e, len = self.len, "failed to trim rejected WAL append");
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(|e| EmberError::durability("sync WAL", e))?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all content. Only valid once it is captured in a segment.
    pub fn truncate(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| EmberError::durability("truncate WAL", e))?;
        self.len = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// LSN the next append will receive
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Current file length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
