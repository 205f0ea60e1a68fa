//! WAL Writer
//!
//! Handles appending entries to a log file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::config::WalSyncStrategy;
use crate::error::{KvError, Result};

use super::{check_file_header, file_header, Operation, WalEntry, WalRecovery, FILE_HEADER_SIZE};

/// Writes entries to a log file
///
/// Each entry is framed in memory and written with a single `write_all`.
/// A write that fails part way is cut back off the file; if that is not
/// possible (or an fsync fails) the writer refuses every later append.
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// File length just past the last complete entry
    valid_len: u64,
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// Set once the file may hold bytes that were never acknowledged
    failed: bool,
}

impl WalWriter {
    /// Open or create a log file, continuing after its last valid LSN
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };
        Self::open_with_lsn(path, sync_strategy, last_lsn)
    }

    /// Open or create a log file whose last LSN is already known
    pub fn open_with_lsn(
        path: &Path,
        sync_strategy: WalSyncStrategy,
        last_lsn: u64,
    ) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(&file_header())?;
            file.sync_all()?;
        } else {
            check_file_header(&mut file)?;
        }
        let valid_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            valid_len,
            current_lsn: last_lsn,
            sync_strategy,
            unsynced: 0,
            failed: false,
        })
    }

    /// Append an operation to the log, returning its LSN
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.check_usable()?;

        let lsn = self.current_lsn + 1;
        let bytes = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            self.rollback();
            return Err(e.into());
        }
        self.valid_len += bytes.len() as u64;
        self.current_lsn = lsn;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.check_usable()?;
        if let Err(e) = self.file.sync_data() {
            // Unsynced pages may have been dropped; the file no longer
            // matches what was acknowledged.
            self.failed = true;
            error!(path = %self.path.display(), error = %e, "log fsync failed");
            return Err(e.into());
        }
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry, keeping only the file header
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.write_all(&file_header())?;
        self.file.sync_all()?;

        self.valid_len = FILE_HEADER_SIZE;
        self.current_lsn = 0;
        self.unsynced = 0;
        self.failed = false;
        Ok(())
    }

    /// Flush buffers and fsync, reporting failures as close errors
    pub fn close(mut self) -> Result<()> {
        self.sync()
            .map_err(|e| KvError::Close(format!("{}: {}", self.path.display(), e)))
    }

    /// Get the current (last written) LSN
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries written since the last fsync
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }

    /// Whether an earlier failure has made the writer refuse appends
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the log file to `path`, keeping this writer attached to it
    pub(crate) fn rename_to(&mut self, path: &Path) -> Result<()> {
        fs::rename(&self.path, path)?;
        self.path = path.to_path_buf();
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(KvError::Write(format!(
                "{}: log is unwritable after an earlier failure",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Cut a partially written entry off the end of the file
    fn rollback(&mut self) {
        match self.file.set_len(self.valid_len) {
            Ok(()) => warn!(
                path = %self.path.display(),
                valid_len = self.valid_len,
                "rolled back partial log entry"
            ),
            Err(e) => {
                self.failed = true;
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "could not roll back partial log entry"
                );
            }
        }
    }
}
