//! WAL Entry definitions
//!
//! Defines the structure of individual log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Entry header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry's data section (256 MB)
pub const MAX_ENTRY_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// Key touched by this operation
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }
}

/// Data section as written to disk
#[derive(Serialize, Deserialize)]
struct Payload {
    operation: Operation,
    timestamp: u64,
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let payload = Payload {
            operation: self.operation.clone(),
            timestamp: self.timestamp,
        };
        bincode::serialize(&payload).map_err(|e| KvError::Serialization(e.to_string()))
    }

    fn crc_of(lsn: u64, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }

    /// CRC32 over LSN + data section
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(Self::crc_of(self.lsn, &self.payload()?))
    }

    /// Size of the framed entry in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + self.payload()?.len())
    }

    /// Frame the entry: [LSN][CRC][Len][Data]
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.payload()?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(KvError::Serialization(format!(
                "Entry too large: {} bytes (max {})",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
        buf.put_u64_le(self.lsn);
        buf.put_u32_le(Self::crc_of(self.lsn, &data));
        buf.put_u32_le(data.len() as u32);
        buf.put_slice(&data);

        Ok(buf.to_vec())
    }

    /// Parse a framed entry, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = Self::parse_header(bytes)?;
        let (lsn, crc, len) = header;

        let data_end = HEADER_SIZE + len as usize;
        if bytes.len() < data_end {
            return Err(KvError::WalCorruption(format!(
                "Truncated entry: expected {} bytes, got {}",
                data_end,
                bytes.len()
            )));
        }

        let data = &bytes[HEADER_SIZE..data_end];
        let actual = Self::crc_of(lsn, data);
        if actual != crc {
            return Err(KvError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:08x}, computed {:08x}",
                lsn, crc, actual
            )));
        }

        let payload: Payload = bincode::deserialize(data)
            .map_err(|e| KvError::WalCorruption(format!("Undecodable entry: {}", e)))?;

        Ok(Self {
            lsn,
            operation: payload.operation,
            timestamp: payload.timestamp,
        })
    }

    /// Split a header into (lsn, crc, data_len)
    pub(crate) fn parse_header(bytes: &[u8]) -> Result<(u64, u32, u32)> {
        if bytes.len() < HEADER_SIZE {
            return Err(KvError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);

        let len = u32::from_le_bytes(len);
        if len > MAX_ENTRY_SIZE {
            return Err(KvError::WalCorruption(format!(
                "Entry length {} exceeds maximum {}",
                len, MAX_ENTRY_SIZE
            )));
        }

        Ok((u64::from_le_bytes(lsn), u32::from_le_bytes(crc), len))
    }
}
