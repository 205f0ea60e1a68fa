//! Secondary indices
//!
//! One store per indexed attribute, mapping an encoded attribute value to
//! the decimal id of the record that last held it. Entries are only ever
//! inserted or overwritten; deletes never reach the index.

use std::path::Path;

use tracing::debug;

use crate::codec::{self, Value};
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::store::{Store, StoreOptions};

/// Value → id index over one attribute of one table
pub struct Index {
    table: String,
    attribute: String,
    store: Store,
}

impl Index {
    /// Open or create the index store for `table`.`attribute`
    pub fn open(config: &Config, table: &str, attribute: &str) -> Result<Self> {
        let path = config.index_path(table, attribute);
        let store = Store::open_with(&path, StoreOptions::from(config))?;

        Ok(Self {
            table: table.to_string(),
            attribute: attribute.to_string(),
            store,
        })
    }

    /// Point `value` at `id`, replacing whatever it pointed at before
    pub fn set(&self, value: &Value, id: u64) -> Result<()> {
        let key = codec::encode_value(value)?;
        self.store.set(&key, id.to_string().as_bytes())?;
        debug!(
            table = %self.table,
            attribute = %self.attribute,
            id,
            "index entry written"
        );
        Ok(())
    }

    /// Id last stored for `value`
    pub fn get(&self, value: &Value) -> Result<Option<u64>> {
        let key = codec::encode_value(value)?;
        match self.store.get(&key)? {
            Some(bytes) => parse_id(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Number of distinct indexed values
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn compact(&self) -> Result<()> {
        self.store.compact()
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

/// Parse a decimal id as stored in index and counter entries
pub(crate) fn parse_id(bytes: &[u8]) -> Result<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            KvError::InvalidCounter(format!(
                "expected a decimal id, got {:?}",
                String::from_utf8_lossy(bytes)
            ))
        })
}
