//! Write-Ahead Log (WAL) Module
//!
//! Every store file *is* a log: a short file header followed by framed
//! entries. Replaying the entries in order rebuilds the store's contents.
//!
//! ## Responsibilities
//! - Append log entries before any mutation
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ File Header                             │
//! │ ┌──────────────┬─────────────┐          │
//! │ │ Magic "KVRL" │ Version (2) │          │
//! │ └──────────────┴─────────────┘          │
//! ├─────────────────────────────────────────┤
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod writer;
mod reader;
mod recovery;

use std::io::Read;

use crate::error::{KvError, Result};

pub use entry::{WalEntry, Operation, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use writer::WalWriter;
pub use reader::{WalIterator, WalReader};
pub use recovery::{WalRecovery, RecoveryResult};

/// Magic bytes identifying a kvrecord log file
pub const MAGIC: &[u8; 4] = b"KVRL";

/// Current log format version
pub const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2)
pub const FILE_HEADER_SIZE: u64 = 6;

/// Encoded file header
pub(crate) fn file_header() -> [u8; FILE_HEADER_SIZE as usize] {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Read and validate the file header from the start of `reader`
pub(crate) fn check_file_header<R: Read>(reader: &mut R) -> Result<()> {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut header)?;

    if &header[0..4] != MAGIC {
        return Err(KvError::Storage(format!(
            "Invalid log magic: expected KVRL, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(KvError::Storage(format!(
            "Unsupported log version: {}",
            version
        )));
    }

    Ok(())
}
