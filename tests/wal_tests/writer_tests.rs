//! Tests for WAL Writer
//!
//! These tests verify:
//! - Writing entries to a log file
//! - LSN generation and sequencing
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Truncation
//! - Integration with reader

use std::fs;
use std::path::PathBuf;

use kvrecord::config::WalSyncStrategy;
use kvrecord::wal::{Operation, WalReader, WalWriter, FILE_HEADER_SIZE};
use kvrecord::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.kvr");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_open_writes_file_header() {
    let (_temp, wal_path) = setup_temp_wal();

    let writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 0);
    drop(writer);

    let bytes = fs::read(&wal_path).unwrap();
    assert_eq!(bytes.len() as u64, FILE_HEADER_SIZE);
    assert_eq!(&bytes[0..4], b"KVRL");
}

#[test]
fn test_write_multiple_entries() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    let lsn1 = writer.append(put("a", "1")).unwrap();
    let lsn2 = writer.append(put("b", "2")).unwrap();
    let lsn3 = writer.append(Operation::Delete { key: b"a".to_vec() }).unwrap();

    assert_eq!((lsn1, lsn2, lsn3), (1, 2, 3));
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    for i in 0..100u64 {
        let lsn = writer
            .append(put(&format!("key{}", i), &format!("val{}", i)))
            .unwrap();
        assert_eq!(lsn, i + 1);
    }
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(put("b", "2")).unwrap();
        writer.close().unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 2);
    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
}

#[test]
fn test_open_rejects_foreign_file() {
    let (_temp, wal_path) = setup_temp_wal();
    fs::write(&wal_path, b"not a kvrecord log at all").unwrap();

    let result = WalWriter::open_with_lsn(&wal_path, WalSyncStrategy::EveryWrite, 0);
    assert!(matches!(result, Err(KvError::Storage(_))));
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put("k1", "v1")).unwrap();
    assert_eq!(writer.unsynced(), 0);

    writer.append(put("k2", "v2")).unwrap();
    assert_eq!(writer.unsynced(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 5 }).unwrap();

    for i in 0..4 {
        writer.append(put(&format!("k{}", i), "v")).unwrap();
    }
    assert_eq!(writer.unsynced(), 4);

    // 5th entry triggers the sync
    writer.append(put("k5", "v")).unwrap();
    assert_eq!(writer.unsynced(), 0);

    writer.append(put("k6", "v")).unwrap();
    assert_eq!(writer.unsynced(), 1);
}

#[test]
fn test_manual_sync() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    for i in 0..10 {
        writer.append(put(&format!("k{}", i), "v")).unwrap();
    }
    assert_eq!(writer.unsynced(), 10);

    writer.sync().unwrap();
    assert_eq!(writer.unsynced(), 0);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncate_resets_log() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..10 {
        writer.append(put(&format!("k{}", i), "v")).unwrap();
    }

    writer.truncate().unwrap();
    assert_eq!(writer.current_lsn(), 0);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), FILE_HEADER_SIZE);

    // Writing after truncation starts over at LSN 1
    assert_eq!(writer.append(put("fresh", "v")).unwrap(), 1);
    drop(writer);

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation.key(), b"fresh");
}

// =============================================================================
// Writer/Reader Integration
// =============================================================================

#[test]
fn test_written_entries_are_readable() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(Operation::Delete { key: b"a".to_vec() }).unwrap();
    writer.append(put("b", "2")).unwrap();
    writer.close().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    let mut lsns = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        lsns.push(entry.lsn);
    }

    assert_eq!(lsns, vec![1, 2, 3]);
    assert!(!reader.is_torn());
}
