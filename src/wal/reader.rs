//! WAL Reader
//!
//! Handles reading entries from a log file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::entry::HEADER_SIZE;
use super::{check_file_header, WalEntry, FILE_HEADER_SIZE};

/// Reads entries from a log file, front to back
///
/// A torn tail (partial header or data) ends iteration quietly; a checksum
/// mismatch is reported as `WalCorruption` and also ends iteration.
pub struct WalReader {
    file: BufReader<File>,
    /// Offset just past the last valid entry
    position: u64,
    /// Set when the file ends in the middle of an entry or header
    torn: bool,
    done: bool,
}

impl WalReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::new(file);

        // A brand new file has no header yet; a stub shorter than the
        // header is a torn creation.
        let (position, torn, done) = if file_len == 0 {
            (0, false, true)
        } else if file_len < FILE_HEADER_SIZE {
            (0, true, true)
        } else {
            check_file_header(&mut file)?;
            (FILE_HEADER_SIZE, false, false)
        };

        Ok(Self {
            file,
            position,
            torn,
            done,
        })
    }

    /// Read the next entry from the log
    ///
    /// Returns `Ok(None)` at end of file or at a partially written entry.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.done {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        let n = self.read_full(&mut header)?;
        if n == 0 {
            self.done = true;
            return Ok(None);
        }
        if n < HEADER_SIZE {
            self.mark_torn();
            return Ok(None);
        }

        let (_, _, len) = match WalEntry::parse_header(&header) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        let mut frame = vec![0u8; HEADER_SIZE + len as usize];
        frame[..HEADER_SIZE].copy_from_slice(&header);
        let n = self.read_full(&mut frame[HEADER_SIZE..])?;
        if n < len as usize {
            self.mark_torn();
            return Ok(None);
        }

        match WalEntry::deserialize(&frame) {
            Ok(entry) => {
                self.position += frame.len() as u64;
                Ok(Some(entry))
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self }
    }

    /// Byte offset just past the last entry read successfully
    pub fn valid_offset(&self) -> u64 {
        self.position
    }

    /// Whether reading stopped at a partially written entry
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    fn mark_torn(&mut self) {
        self.torn = true;
        self.done = true;
    }

    /// Read until `buf` is full or EOF, returning the bytes read
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over log entries
pub struct WalIterator {
    reader: WalReader,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_entry().transpose()
    }
}
