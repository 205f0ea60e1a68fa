//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

/// In-memory table of live key-value pairs
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    /// Whether the key is present (read lock)
    pub fn contains(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Put a key-value pair (write lock), returning the previous value
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        let added = key.len() + value.len();
        let key_len = key.len();
        let previous = self.data.write().insert(key, value);

        self.size.fetch_add(added, Ordering::Relaxed);
        if let Some(old) = &previous {
            self.size.fetch_sub(key_len + old.len(), Ordering::Relaxed);
        }
        previous
    }

    /// Remove a key (write lock), returning the value it held
    pub fn delete(&self, key: &[u8]) -> Option<Vec<u8>> {
        let removed = self.data.write().remove(key);
        if let Some(old) = &removed {
            self.size.fetch_sub(key.len() + old.len(), Ordering::Relaxed);
        }
        removed
    }

    /// First entry strictly after / at the given bound (read lock)
    pub fn seek(&self, from: Bound<&[u8]>) -> Option<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .range::<[u8], _>((from, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Copy of all entries in sorted key order
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.data.write().clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
