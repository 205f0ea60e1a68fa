//! Error types for kvrecord
//!
//! Provides a unified error type for all operations. A missing key or
//! record is never an error; lookups return `Ok(None)` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for kvrecord operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<KvError>,
    },

    #[error("Store already open in this process: {0}")]
    AlreadyOpen(PathBuf),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Close failed: {0}")]
    Close(String),

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid id counter: {0}")]
    InvalidCounter(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Attribute '{attribute}' is not declared on table '{table}'")]
    UndeclaredAttribute { table: String, attribute: String },

    #[error("Attribute '{attribute}' is not indexed on table '{table}'")]
    NotIndexed { table: String, attribute: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Wrap an error raised while opening the store at `path`
    pub(crate) fn open(path: impl Into<PathBuf>, source: KvError) -> Self {
        KvError::Open {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// True for errors raised while opening or creating a store
    pub fn is_open_error(&self) -> bool {
        matches!(self, KvError::Open { .. } | KvError::AlreadyOpen(_))
    }
}
