//! Store Tests
//!
//! These tests verify:
//! - Opening creates directories and the file
//! - Point get/set/remove
//! - Persistence across reopen
//! - Recovery from damaged tails
//! - Compaction
//! - Single opener per path

use std::fs::{self, OpenOptions};
use std::io::Write;

use kvrecord::store::{Store, StoreOptions};
use kvrecord::wal::FILE_HEADER_SIZE;
use kvrecord::KvError;

use super::{eager_compaction, setup_temp_store};

// =============================================================================
// Open / Basic Operations
// =============================================================================

#[test]
fn test_open_creates_directory_and_file() {
    let (_temp, path) = setup_temp_store();
    assert!(!path.parent().unwrap().exists());

    let store = Store::open(&path).unwrap();

    assert!(path.exists());
    assert!(store.is_empty());
    assert_eq!(store.path(), path.as_path());
    store.close().unwrap();
}

#[test]
fn test_set_get_remove() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open(&path).unwrap();

    store.set(b"alpha", b"1").unwrap();
    store.set(b"beta", b"2").unwrap();

    assert_eq!(store.get(b"alpha").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"gamma").unwrap(), None);
    assert_eq!(store.len(), 2);

    assert!(store.remove(b"alpha").unwrap());
    assert!(!store.remove(b"alpha").unwrap());
    assert_eq!(store.get(b"alpha").unwrap(), None);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_remove_absent_key_writes_nothing() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open(&path).unwrap();
    store.set(b"k", b"v").unwrap();
    let entries = store.log_entries();

    assert!(!store.remove(b"missing").unwrap());
    assert_eq!(store.log_entries(), entries);
    assert_eq!(store.garbage(), 0);
}

#[test]
fn test_overwrite_counts_garbage() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open(&path).unwrap();

    store.set(b"k", b"v1").unwrap();
    store.set(b"k", b"v2").unwrap();
    assert_eq!(store.garbage(), 1);

    store.remove(b"k").unwrap();
    assert_eq!(store.garbage(), 3);
    assert_eq!(store.log_entries(), 3);
}

// =============================================================================
// Persistence / Recovery
// =============================================================================

#[test]
fn test_reopen_restores_contents() {
    let (_temp, path) = setup_temp_store();

    {
        let store = Store::open(&path).unwrap();
        store.set(b"a", b"1").unwrap();
        store.set(b"b", b"2").unwrap();
        store.set(b"a", b"3").unwrap();
        store.remove(b"b").unwrap();
        store.close().unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), None);
    assert_eq!(store.len(), 1);
    assert_eq!(store.log_entries(), 4);
    assert_eq!(store.garbage(), 3);
}

#[test]
fn test_reopen_after_drop_without_close() {
    let (_temp, path) = setup_temp_store();

    {
        let store = Store::open_with(&path, StoreOptions::default()).unwrap();
        store.set(b"a", b"1").unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_recovers_from_torn_tail() {
    let (_temp, path) = setup_temp_store();

    {
        let store = Store::open(&path).unwrap();
        store.set(b"a", b"1").unwrap();
        store.set(b"b", b"2").unwrap();
        store.close().unwrap();
    }
    let clean_len = fs::metadata(&path).unwrap().len();

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xFF; 20]).unwrap();
    drop(file);

    let store = Store::open(&path).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

    // Appends land after the repaired tail
    store.set(b"c", b"3").unwrap();
    store.close().unwrap();

    let store = Store::open(&path).unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn test_open_foreign_file_fails() {
    let (_temp, path) = setup_temp_store();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"this is not a store file").unwrap();

    let err = Store::open(&path).err().unwrap();
    assert!(err.is_open_error());
}

// =============================================================================
// Exclusivity
// =============================================================================

#[test]
fn test_second_open_is_rejected() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open(&path).unwrap();

    assert!(matches!(Store::open(&path), Err(KvError::AlreadyOpen(_))));

    store.close().unwrap();
    Store::open(&path).unwrap();
}

// =============================================================================
// Compaction
// =============================================================================

#[test]
fn test_automatic_compaction() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open_with(&path, eager_compaction()).unwrap();

    for i in 0..5 {
        store.set(b"k", format!("v{}", i).as_bytes()).unwrap();
    }

    // The fifth write pushes garbage to 4 of 5 entries
    assert_eq!(store.log_entries(), 1);
    assert_eq!(store.garbage(), 0);
    assert_eq!(store.get(b"k").unwrap(), Some(b"v4".to_vec()));
    store.close().unwrap();

    let store = Store::open(&path).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v4".to_vec()));
    assert_eq!(store.log_entries(), 1);
}

#[test]
fn test_manual_compaction_shrinks_file() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open(&path).unwrap();

    for i in 0..50 {
        store.set(format!("key{:02}", i).as_bytes(), b"some value").unwrap();
    }
    for i in 0..40 {
        store.remove(format!("key{:02}", i).as_bytes()).unwrap();
    }
    let before = fs::metadata(&path).unwrap().len();

    store.compact().unwrap();

    let after = fs::metadata(&path).unwrap().len();
    assert!(after < before);
    assert!(after > FILE_HEADER_SIZE);
    assert_eq!(store.len(), 10);
    assert_eq!(store.log_entries(), 10);

    // No temporary file left behind
    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n.to_string_lossy().ends_with(".compact"))
        .collect();
    assert!(leftovers.is_empty());

    store.set(b"after", b"compaction").unwrap();
    store.close().unwrap();

    let store = Store::open(&path).unwrap();
    assert_eq!(store.len(), 11);
    assert_eq!(store.get(b"key45").unwrap(), Some(b"some value".to_vec()));
}

#[test]
fn test_failed_compaction_keeps_store_usable() {
    let (_temp, path) = setup_temp_store();
    let store = Store::open_with(&path, eager_compaction()).unwrap();
    store.set(b"k", b"v0").unwrap();

    // A directory squatting on the sibling path makes every compaction fail
    let sibling = path.with_file_name("test.kvr.compact");
    fs::create_dir(&sibling).unwrap();

    assert!(store.compact().is_err());

    // Writes that cross the threshold still commit
    for i in 1..10 {
        store.set(b"k", format!("v{}", i).as_bytes()).unwrap();
    }
    assert!(store.remove(b"k").unwrap());
    store.set(b"other", b"x").unwrap();
    assert!(store.garbage() >= 4);
    assert_eq!(store.get(b"k").unwrap(), None);
    store.close().unwrap();

    fs::remove_dir(&sibling).unwrap();
    let store = Store::open(&path).unwrap();
    assert_eq!(store.get(b"k").unwrap(), None);
    assert_eq!(store.get(b"other").unwrap(), Some(b"x".to_vec()));
    assert_eq!(store.len(), 1);

    store.compact().unwrap();
    assert_eq!(store.log_entries(), 1);
    assert_eq!(store.get(b"other").unwrap(), Some(b"x".to_vec()));
}
