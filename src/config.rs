//! Configuration for kvrecord
//!
//! Centralized configuration with sensible defaults.
//!
//! The data directory default is process-wide: `set_default_data_dir` changes
//! where tables opened *afterwards* live. A `Config` snapshots the default
//! when it is built, so already-open tables are unaffected.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;

/// Data directory used when nothing else was configured
pub const DEFAULT_DATA_DIR: &str = "./data";

/// File extension used for table and index files
pub const DEFAULT_EXTENSION: &str = "kvr";

static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = parking_lot::const_rwlock(None);

/// Set the process-wide data directory for tables opened after this call
pub fn set_default_data_dir(path: impl Into<PathBuf>) {
    *DATA_DIR_OVERRIDE.write() = Some(path.into());
}

/// Revert the process-wide data directory to `DEFAULT_DATA_DIR`
pub fn reset_default_data_dir() {
    *DATA_DIR_OVERRIDE.write() = None;
}

/// Current process-wide data directory
pub fn default_data_dir() -> PathBuf {
    DATA_DIR_OVERRIDE
        .read()
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Main configuration for tables and their stores
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {Table}.{ext}          (records + last_id counter)
    ///     └── {Table}_{attr}.{ext}   (one per indexed attribute)
    pub data_dir: PathBuf,

    /// File extension for store files (without the dot)
    pub extension: String,

    // -------------------------------------------------------------------------
    // Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the log
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Minimum number of dead log entries before compaction is considered
    pub compaction_min_garbage: u64,

    /// Dead / total entry ratio that triggers a compaction
    pub compaction_ratio: f64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            extension: DEFAULT_EXTENSION.to_string(),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            compaction_min_garbage: 1024,
            compaction_ratio: 0.5,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the store backing table `name`
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.{}", name, self.extension))
    }

    /// Path of the store backing the index on `table`.`attribute`
    pub fn index_path(&self, table: &str, attribute: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.{}", table, attribute, self.extension))
    }

    /// Data directory for this config
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all stores)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the store file extension
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.config.extension = ext.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the dead-entry floor for compaction
    pub fn compaction_min_garbage(mut self, count: u64) -> Self {
        self.config.compaction_min_garbage = count;
        self
    }

    /// Set the dead/total ratio that triggers compaction
    pub fn compaction_ratio(mut self, ratio: f64) -> Self {
        self.config.compaction_ratio = ratio;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
