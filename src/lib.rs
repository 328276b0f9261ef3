//! # EmberKV
//!
//! A single-node, log-structured key-value storage engine with:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - A skip-list memtable with true upsert semantics
//! - Immutable sorted segments, each with a bloom filter
//! - On-demand compaction with last-write-wins merging
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │        (RwLock: exclusive writers / shared readers)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │ put                     │ put / get
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │ (SkipList)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                      ┌─────────────────────────┐
//!                      │      Segment Store      │
//!                      │ segments + bloom filters│
//!                      └────────────┬────────────┘
//!                                   │ compact
//!                                   ▼
//!                           one merged segment
//! ```
//!
//! ## Example
//! ```no_run
//! use emberkv::{Config, Engine};
//!
//! let engine = Engine::open(Config::builder().data_dir("./data").build())?;
//! engine.put(b"a", b"1")?;
//! assert_eq!(engine.get(b"a")?, Some(b"1".to_vec()));
//! engine.flush()?;
//! engine.compact()?;
//! # Ok::<(), emberkv::EmberError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod bloom;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EmberError, Result};
pub use config::{Config, WalSyncStrategy};
pub use engine::{Engine, EngineStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
