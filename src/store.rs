//! Store Module
//!
//! The ordered key-value store behind every table and index.
//!
//! ## Responsibilities
//! - Open/create a single store file (creating parent directories)
//! - Replay the log into the memtable on open, truncating damaged tails
//! - Point get/set/remove and ordered cursors from a start key
//! - Compact the log when dead entries pile up

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, trace, warn};

use crate::config::{Config, WalSyncStrategy};
use crate::error::{KvError, Result};
use crate::memtable::MemTable;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Canonical paths of stores currently open in this process
static OPEN_STORES: Mutex<BTreeSet<PathBuf>> = parking_lot::const_mutex(BTreeSet::new());

/// Holds a path in `OPEN_STORES` for as long as the store lives
struct OpenGuard {
    path: PathBuf,
}

impl OpenGuard {
    fn acquire(path: PathBuf) -> Result<Self> {
        let mut open = OPEN_STORES.lock();
        if !open.insert(path.clone()) {
            return Err(KvError::AlreadyOpen(path));
        }
        Ok(Self { path })
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        OPEN_STORES.lock().remove(&self.path);
    }
}

/// Options a store takes from the table-level `Config`
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub wal_sync_strategy: WalSyncStrategy,
    pub compaction_min_garbage: u64,
    pub compaction_ratio: f64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            wal_sync_strategy: config.wal_sync_strategy,
            compaction_min_garbage: config.compaction_min_garbage,
            compaction_ratio: config.compaction_ratio,
        }
    }
}

/// An ordered, persistent key-value store backed by one log file
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/remove/compact): Serialized by `write_lock`
///   - Must acquire: write_lock → WAL → memtable
/// - **Reads** (get/cursor): go straight to the memtable's RwLock
pub struct Store {
    path: PathBuf,
    options: StoreOptions,

    /// Append-only log (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Every live key (internal RwLock); shared with cursors
    memtable: Arc<MemTable>,

    /// Serializes write operations
    write_lock: Mutex<()>,

    /// Entries in the log file
    log_entries: AtomicU64,

    /// Log entries that no longer contribute to the live set
    garbage: AtomicU64,

    _guard: OpenGuard,
}

impl Store {
    /// Open or create a store file with default options
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    /// Open or create a store file
    ///
    /// On startup:
    /// 1. Create the parent directory and the file if absent
    /// 2. Claim the path for this process
    /// 3. Recover the log (dropping a torn or corrupted tail)
    /// 4. Replay entries into the memtable
    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        Self::open_inner(path, options).map_err(|e| match e {
            e @ KvError::AlreadyOpen(_) => e,
            e => KvError::open(path, e),
        })
    }

    fn open_inner(path: &Path, options: StoreOptions) -> Result<Self> {
        // Step 1: Create directory and file
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(path)?;

        // Step 2: One opener per path
        let canonical = fs::canonicalize(path)?;
        let guard = OpenGuard::acquire(canonical)?;

        // Step 3: Recover
        let (entries, recovery) = WalRecovery::recover(path)?;

        // Step 4: Replay
        let memtable = MemTable::new();
        let mut garbage = 0u64;
        for entry in &entries {
            match &entry.operation {
                Operation::Put { key, value } => {
                    if memtable.put(key.clone(), value.clone()).is_some() {
                        garbage += 1;
                    }
                }
                Operation::Delete { key } => {
                    garbage += 1;
                    if memtable.delete(key).is_some() {
                        garbage += 1;
                    }
                }
            }
        }

        let wal = WalWriter::open_with_lsn(path, options.wal_sync_strategy, recovery.last_lsn)?;

        info!(
            path = %path.display(),
            keys = memtable.entry_count(),
            entries = recovery.entries_recovered,
            garbage,
            "store opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            options,
            wal: Mutex::new(wal),
            memtable: Arc::new(memtable),
            write_lock: Mutex::new(()),
            log_entries: AtomicU64::new(recovery.entries_recovered),
            garbage: AtomicU64::new(garbage),
            _guard: guard,
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.memtable.get(key))
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to the log (durability)
    /// 3. Write to the memtable
    /// 4. Compact if enough of the log is dead
    ///
    /// The write is committed once step 2 succeeds; a failed compaction is
    /// logged and left for a later write or an explicit `compact`.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        if self.memtable.put(key.to_vec(), value.to_vec()).is_some() {
            self.garbage.fetch_add(1, Ordering::Relaxed);
        }

        self.maybe_compact();
        Ok(())
    }

    /// Remove a key, returning whether it was present
    ///
    /// Removing an absent key writes nothing.
    pub fn remove(&self, key: &[u8]) -> Result<bool> {
        let _write_guard = self.write_lock.lock();

        if !self.memtable.contains(key) {
            return Ok(false);
        }

        self.append(Operation::Delete { key: key.to_vec() })?;
        self.memtable.delete(key);
        // The delete record and the put it shadows are both dead now
        self.garbage.fetch_add(2, Ordering::Relaxed);

        self.maybe_compact();
        Ok(true)
    }

    /// Ordered cursor over (key, value) pairs starting at the first key >= `start`
    ///
    /// The cursor does not hold any lock between steps, so the store may be
    /// modified while it is being walked.
    pub fn cursor(&self, start: Option<&[u8]>) -> Cursor {
        Cursor {
            memtable: Arc::clone(&self.memtable),
            next: match start {
                Some(key) => Bound::Included(key.to_vec()),
                None => Bound::Unbounded,
            },
        }
    }

    /// Rewrite the log so it only holds live entries
    pub fn compact(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.compact_internal()
    }

    /// Flush and fsync the log
    pub fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }

    /// Close the store gracefully, syncing the log to disk
    pub fn close(self) -> Result<()> {
        let Store { path, wal, .. } = self;
        wal.into_inner().close()?;
        info!(path = %path.display(), "store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Path of the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.memtable.is_empty()
    }

    /// Approximate bytes held by live keys and values
    pub fn size(&self) -> usize {
        self.memtable.size()
    }

    /// Entries currently in the log file
    pub fn log_entries(&self) -> u64 {
        self.log_entries.load(Ordering::Relaxed)
    }

    /// Dead entries currently in the log file
    pub fn garbage(&self) -> u64 {
        self.garbage.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Append to the log (called with write lock held)
    fn append(&self, operation: Operation) -> Result<u64> {
        let lsn = self
            .wal
            .lock()
            .append(operation)
            .map_err(|e| KvError::Write(format!("{}: {}", self.path.display(), e)))?;
        self.log_entries.fetch_add(1, Ordering::Relaxed);
        Ok(lsn)
    }

    /// Compact when dead entries cross both thresholds (write lock held)
    fn maybe_compact(&self) {
        let garbage = self.garbage();
        let total = self.log_entries();

        if garbage < self.options.compaction_min_garbage || total == 0 {
            return;
        }
        if (garbage as f64) / (total as f64) < self.options.compaction_ratio {
            return;
        }

        if let Err(e) = self.compact_internal() {
            warn!(path = %self.path.display(), error = %e, "automatic compaction failed");
        }
    }

    /// Write the live set to a sibling file and swap it in (write lock held)
    ///
    /// The replacement writer is opened on the sibling before the rename, so
    /// any failure leaves the current log and writer untouched.
    fn compact_internal(&self) -> Result<()> {
        let snapshot = self.memtable.snapshot();
        let live = snapshot.len() as u64;
        let before = self.log_entries();
        let tmp = compaction_path(&self.path);

        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }

        {
            let mut writer = WalWriter::open_with_lsn(
                &tmp,
                WalSyncStrategy::EveryNEntries { count: usize::MAX },
                0,
            )?;
            for (key, value) in snapshot {
                writer.append(Operation::Put { key, value })?;
            }
            writer.close()?;
        }
        let mut replacement =
            WalWriter::open_with_lsn(&tmp, self.options.wal_sync_strategy, live)?;

        let mut wal = self.wal.lock();
        wal.sync()?;
        replacement.rename_to(&self.path)?;
        *wal = replacement;

        self.log_entries.store(live, Ordering::Relaxed);
        self.garbage.store(0, Ordering::Relaxed);

        info!(
            path = %self.path.display(),
            before,
            after = live,
            "store compacted"
        );
        Ok(())
    }
}

/// Sibling path used while compacting `path`
fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".compact");
    path.with_file_name(name)
}

/// Ordered iterator over a store's entries
///
/// Each step re-seeks past the previously returned key, so entries written
/// behind the cursor are skipped and entries written ahead are seen.
pub struct Cursor {
    memtable: Arc<MemTable>,
    next: Bound<Vec<u8>>,
}

impl Cursor {
    /// Reposition the cursor at the first key >= `key`
    pub fn jump(&mut self, key: &[u8]) {
        self.next = Bound::Included(key.to_vec());
    }
}

impl Iterator for Cursor {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let from = match &self.next {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let (key, value) = self.memtable.seek(from)?;
        trace!(key_len = key.len(), "cursor step");
        self.next = Bound::Excluded(key.clone());
        Some((key, value))
    }
}
