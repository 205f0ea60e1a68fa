//! WAL Recovery
//!
//! Handles crash recovery by replaying the log.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::{KvError, Result};

use super::{WalEntry, WalReader};

/// Handles log recovery after a crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the log was (or would be) truncated to drop a bad tail
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a log file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first corrupted entry
    /// 3. Truncate partial writes and everything after a corruption
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_offset) = Self::scan(path, true)?;

        if result.was_truncated {
            warn!(
                path = %path.display(),
                valid_offset,
                entries_recovered = result.entries_recovered,
                entries_corrupted = result.entries_corrupted,
                "truncating damaged log tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_offset)?;
            file.sync_all()?;
        }

        Ok((entries, result))
    }

    /// Verify integrity of a log file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, keep: bool) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if keep {
                        entries.push(entry);
                    }
                }
                Ok(None) => {
                    result.was_truncated = reader.is_torn();
                    break;
                }
                Err(KvError::WalCorruption(reason)) => {
                    warn!(path = %path.display(), %reason, "corrupted log entry");
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, reader.valid_offset()))
    }
}
