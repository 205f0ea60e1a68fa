//! Tests for WAL Reader
//!
//! These tests verify:
//! - Reading entries from a log file
//! - Iterator functionality
//! - Partial write handling
//! - Empty and foreign file handling

use std::fs::{self, File};
use std::path::PathBuf;

use kvrecord::wal::{Operation, WalEntry, WalReader, FILE_HEADER_SIZE};
use kvrecord::KvError;
use tempfile::TempDir;

use super::write_raw_log;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.kvr");
    (temp_dir, wal_path)
}

fn put_entry(lsn: u64, key: &str, value: &str) -> WalEntry {
    WalEntry::new(
        lsn,
        Operation::Put {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        },
    )
}

// =============================================================================
// Basic Reading Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert!(!reader.is_torn());
}

#[test]
fn test_read_header_only() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_log(&wal_path, &[], &[]);

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.valid_offset(), FILE_HEADER_SIZE);
}

#[test]
fn test_read_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries = vec![
        put_entry(1, "a", "1"),
        WalEntry::new(2, Operation::Delete { key: b"a".to_vec() }),
        put_entry(3, "b", "2"),
    ];
    write_raw_log(&wal_path, &entries, &[]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    for expected in &entries {
        assert_eq!(reader.next_entry().unwrap().as_ref(), Some(expected));
    }
    assert!(reader.next_entry().unwrap().is_none());

    let total: usize = entries.iter().map(|e| e.serialized_size().unwrap()).sum();
    assert_eq!(reader.valid_offset(), FILE_HEADER_SIZE + total as u64);
}

#[test]
fn test_iterator_for_loop() {
    let (_temp, wal_path) = setup_temp_wal();
    let entries: Vec<_> = (1..=10)
        .map(|i| put_entry(i, &format!("k{}", i), "v"))
        .collect();
    write_raw_log(&wal_path, &entries, &[]);

    let mut seen = Vec::new();
    for entry in WalReader::open(&wal_path).unwrap().entries() {
        seen.push(entry.unwrap().lsn);
    }

    assert_eq!(seen, (1..=10).collect::<Vec<_>>());
}

// =============================================================================
// Partial Write Tests
// =============================================================================

#[test]
fn test_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_raw_log(&wal_path, &[put_entry(1, "a", "1")], &[0u8; 7]);

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.is_torn());
}

#[test]
fn test_partial_data() {
    let (_temp, wal_path) = setup_temp_wal();
    let torn = put_entry(2, "b", "a value long enough to cut").serialize().unwrap();
    write_raw_log(&wal_path, &[put_entry(1, "a", "1")], &torn[..torn.len() - 5]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    let first = reader.next_entry().unwrap().unwrap();
    let offset = reader.valid_offset();

    assert_eq!(first.lsn, 1);
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.is_torn());
    // The torn frame is not counted as valid
    assert_eq!(reader.valid_offset(), offset);
}

#[test]
fn test_torn_file_header() {
    let (_temp, wal_path) = setup_temp_wal();
    fs::write(&wal_path, b"KVR").unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.is_torn());
    assert_eq!(reader.valid_offset(), 0);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_bad_magic_rejected() {
    let (_temp, wal_path) = setup_temp_wal();
    fs::write(&wal_path, b"NOPE\x01\x00").unwrap();

    let result = WalReader::open(&wal_path);
    assert!(matches!(result, Err(KvError::Storage(_))));
}

#[test]
fn test_corrupted_entry_stops_reading() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut bad = put_entry(2, "b", "2").serialize().unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    let after = put_entry(3, "c", "3").serialize().unwrap();
    let trailer: Vec<u8> = bad.into_iter().chain(after).collect();
    write_raw_log(&wal_path, &[put_entry(1, "a", "1")], &trailer);

    let mut reader = WalReader::open(&wal_path).unwrap();

    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(KvError::WalCorruption(_))));
    // Nothing past the corruption is returned
    assert!(reader.next_entry().unwrap().is_none());
}

// =============================================================================
// Content Tests
// =============================================================================

#[test]
fn test_large_entry() {
    let (_temp, wal_path) = setup_temp_wal();
    let value = vec![0x5A; 512 * 1024];
    let entry = WalEntry::new(
        1,
        Operation::Put {
            key: b"big".to_vec(),
            value: value.clone(),
        },
    );
    write_raw_log(&wal_path, &[entry], &[]);

    let mut reader = WalReader::open(&wal_path).unwrap();
    match reader.next_entry().unwrap().unwrap().operation {
        Operation::Put { value: read, .. } => assert_eq!(read, value),
        _ => panic!("Expected Put operation"),
    }
}
