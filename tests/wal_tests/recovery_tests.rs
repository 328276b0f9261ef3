//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty WAL
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted entries (CRC mismatch)
//! - Verify mode (stats only, file untouched)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use emberkv::config::WalSyncStrategy;
use emberkv::record::{Record, HEADER_SIZE};
use emberkv::wal::{WalRecovery, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(format!("key{}", i).as_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
}

/// Write raw frames directly to a file (for crafting corruption)
fn write_raw_frames(path: &PathBuf, frames: &[Vec<u8>]) {
    let mut file = File::create(path).unwrap();
    for frame in frames {
        file.write_all(frame).unwrap();
    }
    file.sync_all().unwrap();
}

fn frame(seq: u64, key: &str, value: &str) -> Vec<u8> {
    Record::new(seq, key.as_bytes().to_vec(), value.as_bytes().to_vec())
        .encode()
        .unwrap()
        .to_vec()
}

// =============================================================================
// Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_entries_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 50);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 50);
    assert_eq!(result.entries_recovered, 50);
    assert_eq!(result.last_lsn, 50);
    assert!(!result.was_truncated);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.seq, i as u64 + 1);
        assert_eq!(entry.key, format!("key{}", i).into_bytes());
        assert_eq!(entry.value, format!("value{}", i).into_bytes());
    }
}

// =============================================================================
// Partial Write Tests
// =============================================================================

#[test]
fn test_recover_truncates_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);
    let clean_len = fs::metadata(&wal_path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAB; HEADER_SIZE / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), clean_len);
}

#[test]
fn test_recover_truncates_partial_body() {
    let (_temp, wal_path) = setup_temp_wal();
    let complete = frame(1, "a", "1");
    let torn = frame(2, "b", "a value that never fully reached the disk");
    write_raw_frames(&wal_path, &[complete.clone(), torn[..torn.len() - 10].to_vec()]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, b"a".to_vec());
    assert!(result.was_truncated);
    assert_eq!(result.last_lsn, 1);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), complete.len() as u64);
}

#[test]
fn test_recover_drops_corrupt_final_record_silently() {
    let (_temp, wal_path) = setup_temp_wal();
    let good = frame(1, "a", "1");
    let mut bad = frame(2, "b", "2");
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    write_raw_frames(&wal_path, &[good.clone(), bad]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 0);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), good.len() as u64);
}

#[test]
fn test_recovered_wal_accepts_new_appends() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(b"garbage").unwrap();
    drop(file);

    WalRecovery::recover(&wal_path).unwrap();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(b"next", b"v").unwrap(), 3);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(!result.was_truncated);
}

// =============================================================================
// Mid-Log Corruption Tests
// =============================================================================

#[test]
fn test_recover_skips_corrupt_middle_record() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bad = frame(2, "b", "2");
    bad[HEADER_SIZE + 2] ^= 0xFF;
    write_raw_frames(&wal_path, &[frame(1, "a", "1"), bad, frame(3, "c", "3")]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    let keys: Vec<Vec<u8>> = entries.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 3);
    assert!(!result.was_truncated);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 4);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();
    drop(file);
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 4);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_recover_skips_record_with_corrupt_length() {
    let (_temp, wal_path) = setup_temp_wal();
    let frames = vec![
        frame(1, "k0", "v0"),
        frame(2, "k1", "v1"),
        frame(3, "k2", "v2"),
        frame(4, "k3", "v3"),
    ];
    let mut damaged = frames[1].clone();
    // High byte of the length field: the frame now claims to run past EOF
    damaged[HEADER_SIZE - 1] ^= 0xFF;
    write_raw_frames(
        &wal_path,
        &[frames[0].clone(), damaged, frames[2].clone(), frames[3].clone()],
    );
    let len_before = fs::metadata(&wal_path).unwrap().len();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    let keys: Vec<Vec<u8>> = entries.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec![b"k0".to_vec(), b"k2".to_vec(), b"k3".to_vec()]);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 4);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), len_before);
}

#[test]
fn test_recover_skips_record_with_shortened_length() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut damaged = frame(2, "key", "a longer value");
    // Length now ends inside the body, leaving the reader misaligned
    damaged[HEADER_SIZE - 4] = 3;
    write_raw_frames(&wal_path, &[frame(1, "a", "1"), damaged, frame(3, "c", "3")]);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    let keys: Vec<Vec<u8>> = entries.into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
}
