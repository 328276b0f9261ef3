//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Segment Store
//! - Handle concurrent read/write access
//! - Trigger flushes when MemTable is full
//! - Compact segments on demand
//! - Manage crash recovery on startup

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::{compaction, SegmentStore};
use crate::wal::{WalRecovery, WalWriter};

/// Everything a write mutates, guarded as one unit
struct EngineState {
    /// In-memory table for recent writes
    memtable: MemTable,

    /// Write-ahead log for the memtable's contents
    wal: WalWriter,

    /// Persistent segments, oldest first
    storage: SegmentStore,
}

/// Point-in-time sizes, for operators and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    pub segment_count: usize,
    pub segment_bytes: u64,
    pub wal_bytes: u64,
}

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (put/flush): exclusive `state` lock. WAL append, memtable
///   upsert and any triggered flush happen under one guard, so a flush
///   swaps "memtable empty + new segment visible" atomically.
///
/// - **Reads** (get): shared `state` lock. Readers run concurrently and see
///   either the state before or after a flush/compaction, never between.
///
/// - **Compaction**: serialized by `compaction_lock`. It snapshots the
///   segment list under the shared lock, merges and writes the output with
///   no engine lock held, and takes the exclusive lock only to swap the
///   output in.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all segment files
    storage_dir: PathBuf,

    wal_path: PathBuf,

    state: RwLock<EngineState>,

    compaction_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SEGMENT_DIR: &'static str = "segments";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing segments (in creation order)
    /// 3. Replay the WAL into the memtable
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: Compute paths (derived from data_dir, not configurable)
        let storage_dir = config.data_dir.join(Self::SEGMENT_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        // Step 3: Open segment store (creates the directory, loads segments)
        let storage = SegmentStore::open(&storage_dir, config.bloom_false_positive_rate)?;

        // Step 4: Rebuild the memtable from the WAL
        let mut memtable = MemTable::new();
        let mut last_lsn = 0;
        if wal_path.exists() {
            let (records, recovery) = WalRecovery::recover(&wal_path)?;

            for record in records {
                memtable.put(record.key, record.value);
            }
            last_lsn = recovery.last_lsn;

            if recovery.entries_recovered > 0
                || recovery.entries_corrupted > 0
                || recovery.was_truncated
            {
                info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    truncated = recovery.was_truncated,
                    memtable_entries = memtable.entry_count(),
                    "replayed WAL"
                );
            }
        }

        // Step 5: Open the WAL for appends (LSNs continue after replay)
        let wal = WalWriter::resume(&wal_path, config.wal_sync_strategy, last_lsn + 1)?;

        let engine = Self {
            config,
            storage_dir,
            wal_path,
            state: RwLock::new(EngineState {
                memtable,
                wal,
                storage,
            }),
            compaction_lock: Mutex::new(()),
        };

        // Replay can overshoot a threshold that was lowered since the last run
        {
            let mut state = engine.state.write();
            if engine.should_flush(&state.memtable) {
                Self::flush_locked(&mut state)?;
            }

            info!(
                data_dir = %engine.config.data_dir.display(),
                segments = state.storage.segment_count(),
                memtable_entries = state.memtable.entry_count(),
                "engine opened"
            );
        }

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. Segments (newest to oldest, bloom-filtered)
    ///
    /// `Ok(None)` means the key does not exist.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();

        if let Some(value) = state.memtable.get(key) {
            return Ok(Some(value.to_vec()));
        }

        state.storage.get(key)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability); failure aborts the put
    /// 3. Write to MemTable
    /// 4. Flush if the memtable crossed a threshold
    ///
    /// A flush failure in step 4 is returned even though the write itself
    /// is already durable in the WAL.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write();

        // Step 1: Write to WAL first (durability guarantee)
        state.wal.append(key, value)?;

        // Step 2: Write to MemTable
        state.memtable.put(key.to_vec(), value.to_vec());

        // Step 3: Check if flush is needed
        if self.should_flush(&state.memtable) {
            Self::flush_locked(&mut state)?;
        }

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size. No-op when empty.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        Self::flush_locked(&mut state)
    }

    /// Merge all segments into one, newest value per key winning, and
    /// delete the superseded files. No-op when there are no segments.
    pub fn compact(&self) -> Result<()> {
        let _compacting = self.compaction_lock.lock();

        // Flushes take the write lock, so none can slip between the
        // snapshot and the id allocation; their ids will sort after ours.
        let (inputs, output_id) = {
            let state = self.state.read();
            if state.storage.is_empty() {
                return Ok(());
            }
            (state.storage.snapshot(), state.storage.allocate_id())
        };

        let (output, stats) = compaction::compact_segments(
            &inputs,
            &self.storage_dir,
            output_id,
            self.config.bloom_false_positive_rate,
        )?;
        let output_path = output.path().to_path_buf();

        let install = self.state.write().storage.install_compacted(&inputs, output);
        let obsolete = match install {
            Ok(paths) => paths,
            Err(e) => {
                remove_segment_file(&output_path);
                return Err(e);
            }
        };

        // Release our handles before unlinking
        drop(inputs);
        for path in &obsolete {
            remove_segment_file(path);
        }

        info!(
            segment_id = output_id,
            inputs = stats.input_segments,
            entries_read = stats.entries_read,
            entries_written = stats.entries_written,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "compacted segments"
        );

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        let mut state = self.state.write();
        Self::flush_locked(&mut state)?;
        state.wal.sync()
    }

    fn should_flush(&self, memtable: &MemTable) -> bool {
        memtable.exceeds(
            self.config.memtable_size_limit,
            self.config.memtable_entry_limit,
        )
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_locked(state: &mut EngineState) -> Result<()> {
        let EngineState {
            memtable,
            wal,
            storage,
        } = state;

        // Skip if memtable is empty
        if memtable.is_empty() {
            return Ok(());
        }

        let entries = memtable.entry_count();

        // Step 1: Write the sorted memtable to a durable segment
        let segment = storage.flush(memtable.iter())?;

        // Step 2: Clear memtable
        memtable.clear();

        // Step 3: Truncate WAL (entries are now durable in the segment)
        wal.truncate()?;

        info!(
            segment_id = segment.id(),
            entries,
            bytes = segment.file_size(),
            "flushed memtable"
        );

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where segments are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.state.read().memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.state.read().memtable.entry_count()
    }

    /// Copy of the memtable contents in ascending key order
    pub fn memtable_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.state
            .read()
            .memtable
            .iter()
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .collect()
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.state.read().storage.segment_count()
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            memtable_entries: state.memtable.entry_count(),
            memtable_bytes: state.memtable.size(),
            segment_count: state.storage.segment_count(),
            segment_bytes: state.storage.total_bytes(),
            wal_bytes: state.wal.len(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn remove_segment_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to delete segment file");
    }
}
