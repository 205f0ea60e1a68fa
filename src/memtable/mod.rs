//! MemTable Module
//!
//! In-memory ordered view of every live key in a store.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size and entry count
//! - Ordered seeks for cursors and compaction snapshots
//!
//! ## Data Structure Choice
//! Using BTreeMap wrapped in RwLock:
//! - Ordered keys (required for cursors and range scans)
//! - Deleted keys are removed outright; the log carries the delete record,
//!   so no tombstones are kept in memory

mod table;

pub use table::MemTable;
