//! # kvrecord
//!
//! Record persistence over an ordered, embedded key-value store:
//! - Auto-incrementing integer ids per table
//! - Self-describing attribute encoding
//! - Range and page scans in id order
//! - Single-attribute secondary indices (value → id)
//! - Write-ahead log per store file with crash recovery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Caller (CLI / application)                  │
//! │             Record  ·  Model / Repository                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Table                               │
//! │         (ids, last_id counter, scans, per-table lock)       │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │  Store          │                │  Index (× N)    │
//!   │  {Table}.kvr    │                │  {Table}_{a}.kvr│
//!   └───────┬─────────┘                └───────┬─────────┘
//!           │          each Store is           │
//!           ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │ WAL (file) +    │                │ WAL (file) +    │
//!   │ MemTable (RAM)  │                │ MemTable (RAM)  │
//!   └─────────────────┘                └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use kvrecord::{Config, Record, Table};
//!
//! # fn main() -> kvrecord::Result<()> {
//! let config = Config::builder().data_dir("./data").build();
//! let mut users = Table::open_with_config(config, "User", &["username", "age"])?;
//! users.index(&["username"])?;
//!
//! let mut david = Record::new().with("username", "David").with("age", 41);
//! let id = users.save(&mut david)?;
//!
//! assert_eq!(users.find(id)?, Some(david));
//! assert!(users.find_by("username", "David")?.is_some());
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod store;
pub mod codec;
pub mod record;
pub mod index;
pub mod table;
pub mod model;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use codec::Value;
pub use record::{Attributes, Record};
pub use store::Store;
pub use index::Index;
pub use table::Table;
pub use model::{Model, Repository};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvrecord
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
