//! Segment Tests
//!
//! Tests verify:
//! - Building a segment and reading it back
//! - Lookups across sparse index boundaries
//! - Key ordering enforcement in the builder
//! - Reopening rebuilds the filter and index
//! - Staged files never outlive a finished or abandoned build

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use emberkv::storage::{parse_segment_id, segment_file_name, Segment, SegmentBuilder};
use emberkv::EmberError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn key(i: usize) -> Vec<u8> {
    format!("key{:05}", i).into_bytes()
}

fn value(i: usize) -> Vec<u8> {
    format!("value{}", i).into_bytes()
}

fn build_segment(dir: &Path, id: u64, count: usize) -> Segment {
    let path = dir.join(segment_file_name(id));
    let mut builder = SegmentBuilder::create(&path, id, 0.01).unwrap();
    for i in 0..count {
        builder.add(&key(i), &value(i)).unwrap();
    }
    builder.finish().unwrap()
}

fn dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    entries
}

// =============================================================================
// Build & Lookup Tests
// =============================================================================

#[test]
fn test_build_and_get() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 10);

    assert_eq!(segment.id(), 1);
    assert_eq!(segment.entry_count(), 10);
    assert_eq!(segment.file_size(), fs::metadata(segment.path()).unwrap().len());
    assert_eq!(segment.get(b"key00003").unwrap(), Some(value(3)));
    assert_eq!(segment.get(b"key00010").unwrap(), None);
}

#[test]
fn test_get_every_key_across_index_intervals() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 200);

    for i in 0..200 {
        assert_eq!(segment.get(&key(i)).unwrap(), Some(value(i)), "key {}", i);
    }
}

#[test]
fn test_get_absent_keys() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 100);

    // Before the first key, between keys, after the last key
    assert_eq!(segment.get(b"a").unwrap(), None);
    assert_eq!(segment.get(b"key00050x").unwrap(), None);
    assert_eq!(segment.get(b"zzz").unwrap(), None);
}

#[test]
fn test_might_contain_range_and_filter() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 50);

    assert_eq!(segment.min_key(), Some(&b"key00000"[..]));
    assert_eq!(segment.max_key(), Some(&b"key00049"[..]));
    for i in 0..50 {
        assert!(segment.might_contain(&key(i)));
    }
    assert!(!segment.might_contain(b"aaa"));
    assert!(!segment.might_contain(b"zzz"));
}

#[test]
fn test_empty_value_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(segment_file_name(1));
    let mut builder = SegmentBuilder::create(&path, 1, 0.01).unwrap();
    builder.add(b"empty", b"").unwrap();
    let segment = builder.finish().unwrap();

    assert_eq!(segment.get(b"empty").unwrap(), Some(Vec::new()));
}

// =============================================================================
// Builder Ordering Tests
// =============================================================================

#[test]
fn test_out_of_order_key_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(segment_file_name(1));
    let mut builder = SegmentBuilder::create(&path, 1, 0.01).unwrap();

    builder.add(b"b", b"1").unwrap();
    assert!(matches!(builder.add(b"a", b"2"), Err(EmberError::Storage(_))));
    assert!(matches!(builder.add(b"b", b"3"), Err(EmberError::Storage(_))));
    assert_eq!(builder.entry_count(), 1);
}

#[test]
fn test_abandon_removes_staged_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(segment_file_name(1));
    let mut builder = SegmentBuilder::create(&path, 1, 0.01).unwrap();
    builder.add(b"a", b"1").unwrap();

    builder.abandon();

    assert!(dir_entries(temp.path()).is_empty());
}

#[test]
fn test_finish_leaves_only_final_file() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 7, 5);

    assert_eq!(dir_entries(temp.path()), vec![segment.path().to_path_buf()]);
    assert_eq!(parse_segment_id(segment.path()), Some(7));
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_rebuilds_filter_and_index() {
    let temp = TempDir::new().unwrap();
    let path = build_segment(temp.path(), 3, 150).path().to_path_buf();

    let reopened = Segment::open(&path, 3, 0.01).unwrap();

    assert_eq!(reopened.entry_count(), 150);
    assert_eq!(reopened.min_key(), Some(&b"key00000"[..]));
    assert_eq!(reopened.max_key(), Some(&b"key00149"[..]));
    for i in (0..150).step_by(7) {
        assert!(reopened.might_contain(&key(i)));
        assert_eq!(reopened.get(&key(i)).unwrap(), Some(value(i)));
    }
}

#[test]
fn test_reopen_ignores_partial_tail() {
    let temp = TempDir::new().unwrap();
    let path = build_segment(temp.path(), 1, 20).path().to_path_buf();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0u8; 5]).unwrap();
    drop(file);

    let reopened = Segment::open(&path, 1, 0.01).unwrap();
    assert_eq!(reopened.entry_count(), 20);
    assert_eq!(reopened.get(&key(19)).unwrap(), Some(value(19)));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_yields_all_entries_in_order() {
    let temp = TempDir::new().unwrap();
    let segment = build_segment(temp.path(), 1, 40);

    let entries: Vec<(Vec<u8>, Vec<u8>)> = segment.iter().unwrap().map(|e| e.unwrap()).collect();

    let expected: Vec<(Vec<u8>, Vec<u8>)> = (0..40).map(|i| (key(i), value(i))).collect();
    assert_eq!(entries, expected);
}

// =============================================================================
// File Naming Tests
// =============================================================================

#[test]
fn test_segment_file_names() {
    assert_eq!(segment_file_name(42), "segment_000042.sst");
    assert_eq!(parse_segment_id(Path::new("segment_000042.sst")), Some(42));
    assert_eq!(parse_segment_id(Path::new("segment_000042.sst.tmp")), None);
    assert_eq!(parse_segment_id(Path::new("wal.log")), None);
}
