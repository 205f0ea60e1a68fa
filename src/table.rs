//! Table Module
//!
//! One table per record type: a store of encoded records keyed by id, the
//! `last_id` counter, and one index per indexed attribute.
//!
//! ## Key Layout
//! ```text
//! 'm' + name          metadata (last_id, indices, raw keys)
//! 'r' + id (u64 BE)   encoded record attributes
//! ```
//! Big-endian ids sort numerically, and the metadata namespace sorts before
//! every record, so a cursor positioned at an id never meets `last_id`.
//!
//! ## Consistency
//! `save` performs up to three kinds of writes (counter, indices, record)
//! without a transaction. A crash between them can burn an id or leave an
//! index pointing at an id with no record. Deletes never touch indices, and
//! re-indexing never removes an entry for an attribute's previous value.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::codec::{self, Value};
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::index::{parse_id, Index};
use crate::record::Record;
use crate::store::{Store, StoreOptions};

const META_PREFIX: u8 = b'm';
const RECORD_PREFIX: u8 = b'r';
const RECORD_KEY_LEN: usize = 9;

fn record_key(id: u64) -> [u8; RECORD_KEY_LEN] {
    let mut key = [0u8; RECORD_KEY_LEN];
    key[0] = RECORD_PREFIX;
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

fn parse_record_key(key: &[u8]) -> Option<u64> {
    if key.len() != RECORD_KEY_LEN || key[0] != RECORD_PREFIX {
        return None;
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[1..]);
    Some(u64::from_be_bytes(id))
}

fn meta_key(name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(META_PREFIX);
    key.extend_from_slice(name);
    key
}

/// Names end up in file names, so keep them to a single path component
fn check_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(KvError::Config(format!("invalid {} name: {:?}", kind, name)));
    }
    Ok(())
}

/// Persistent collection of records of one type
///
/// ## Concurrency
/// Writes (save, delete, counter and raw writes) take `lock` exclusively, so
/// the non-atomic steps of a save never interleave. Reads take it shared and
/// never observe a half-finished save. Scans only hold it while stepping the
/// cursor, so a visitor may write to the same table.
pub struct Table {
    name: String,
    config: Config,
    /// Declared attribute names, in declaration order
    attributes: Vec<String>,
    store: Store,
    indices: BTreeMap<String, Index>,
    lock: RwLock<()>,
}

impl Table {
    /// Reserved metadata key holding the highest id ever issued
    pub const LAST_ID_KEY: &'static str = "last_id";

    /// Reserved metadata key holding the encoded list of indexed attributes
    pub const INDICES_KEY: &'static str = "indices";

    /// Page size used by `scan_page` callers that have no preference
    pub const DEFAULT_PER_PAGE: usize = 100;

    /// Open (or create) table `name` in the process-wide data directory
    pub fn open(name: &str, attributes: &[&str]) -> Result<Self> {
        Self::open_with_config(Config::default(), name, attributes)
    }

    /// Open (or create) table `name` with an explicit config
    pub fn open_with_config(config: Config, name: &str, attributes: &[&str]) -> Result<Self> {
        check_name("table", name)?;

        let path = config.table_path(name);
        let store = Store::open_with(&path, StoreOptions::from(&config))?;

        let mut table = Self {
            name: name.to_string(),
            config,
            attributes: Vec::new(),
            store,
            indices: BTreeMap::new(),
            lock: RwLock::new(()),
        };
        table.define(attributes)?;

        // Indices registered by earlier opens come back on their own
        if let Some(bytes) = table.store.get(&meta_key(Self::INDICES_KEY.as_bytes()))? {
            let names: Vec<String> = codec::decode(&bytes)?;
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            table.define(&names)?;
            table.open_indices(&names)?;
        }

        info!(table = %table.name, path = %path.display(), "table opened");
        Ok(table)
    }

    /// Declare attributes; names already declared (and `id`) are ignored
    pub fn define(&mut self, attributes: &[&str]) -> Result<()> {
        for attr in attributes {
            check_name("attribute", attr)?;
            if *attr == "id" || self.attributes.iter().any(|a| a == attr) {
                continue;
            }
            self.attributes.push(attr.to_string());
        }
        Ok(())
    }

    /// Maintain a value → id index for each of `attributes`
    ///
    /// Existing records are not back-filled; only later saves are indexed.
    /// The indexed names are stored with the table and reopened by every
    /// later `open`.
    pub fn index(&mut self, attributes: &[&str]) -> Result<()> {
        for attr in attributes {
            self.check_declared(attr)?;
        }
        if !self.open_indices(attributes)? {
            return Ok(());
        }

        let names: Vec<&str> = self.indices().collect();
        let bytes = codec::encode(&names)?;
        let _guard = self.lock.write();
        self.store.set(&meta_key(Self::INDICES_KEY.as_bytes()), &bytes)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Persist `record`, assigning it the next id on first save
    ///
    /// Steps:
    /// 1. Bump and persist `last_id` if the record has no id
    /// 2. Point every index at the id
    /// 3. Write the encoded record under its id
    pub fn save(&self, record: &mut Record) -> Result<u64> {
        for attr in record.attributes().keys() {
            self.check_declared(attr)?;
        }
        let bytes = codec::encode_attributes(record.attributes())?;

        let _guard = self.lock.write();

        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = self
                    .read_last_id()?
                    .checked_add(1)
                    .ok_or_else(|| {
                        KvError::InvalidCounter(format!("{}: id space exhausted", self.name))
                    })?;
                self.write_last_id(id)?;
                record.assign_id(id);
                id
            }
        };

        for (attr, index) in &self.indices {
            let value = record.get(attr).cloned().unwrap_or_default();
            index.set(&value, id)?;
        }

        self.store.set(&record_key(id), &bytes)?;

        debug!(table = %self.name, id, "record saved");
        Ok(id)
    }

    /// Set `attr` on `record` and save it
    pub fn update(
        &self,
        record: &mut Record,
        attr: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<u64> {
        record.set(attr, value);
        self.save(record)
    }

    /// Record stored under `id`, or `None`
    pub fn find(&self, id: u64) -> Result<Option<Record>> {
        let _guard = self.lock.read();
        self.read_record(id)
    }

    /// Record whose indexed `attr` was last saved as `value`
    ///
    /// Returns `None` when the value was never indexed, and also when the
    /// index points at a record that has since been deleted.
    pub fn find_by(&self, attr: &str, value: impl Into<Value>) -> Result<Option<Record>> {
        let index = self.indices.get(attr).ok_or_else(|| KvError::NotIndexed {
            table: self.name.clone(),
            attribute: attr.to_string(),
        })?;

        let _guard = self.lock.read();
        match index.get(&value.into())? {
            Some(id) => self.read_record(id),
            None => Ok(None),
        }
    }

    /// Visit records in ascending id order
    ///
    /// Starts at `start` (or the lowest id) and stops after `limit` records
    /// or at the end of the table. Returns the number of records visited.
    pub fn scan<F>(&self, start: Option<u64>, limit: Option<usize>, mut visit: F) -> Result<usize>
    where
        F: FnMut(Record),
    {
        self.try_scan(start, limit, |record| {
            visit(record);
            Ok(())
        })
    }

    /// `scan` with a fallible visitor; the first error stops the scan
    pub fn try_scan<F>(&self, start: Option<u64>, limit: Option<usize>, mut visit: F) -> Result<usize>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let limit = limit.unwrap_or(usize::MAX);
        let mut cursor = self.store.cursor(Some(&record_key(start.unwrap_or(0))[..]));
        let mut visited = 0;

        while visited < limit {
            let record = {
                let _guard = self.lock.read();
                let Some((key, bytes)) = cursor.next() else {
                    break;
                };
                let Some(id) = parse_record_key(&key) else {
                    break;
                };
                Record::from_parts(id, codec::decode_attributes(&bytes)?)
            };

            visited += 1;
            visit(record)?;
        }

        Ok(visited)
    }

    /// Visit page `page` (1-based) of `per_page` ids
    ///
    /// Pages are id ranges: page N starts at id `(N-1)*per_page + 1`. Gaps
    /// left by deletes are filled from the following ids. Page 0 is treated
    /// as page 1.
    pub fn scan_page<F>(&self, page: u64, per_page: usize, visit: F) -> Result<usize>
    where
        F: FnMut(Record),
    {
        let start = page
            .saturating_sub(1)
            .saturating_mul(per_page as u64)
            .saturating_add(1);
        self.scan(Some(start), Some(per_page), visit)
    }

    /// Remove the record stored under `id`; indices are left as they are
    pub fn delete(&self, id: u64) -> Result<bool> {
        let _guard = self.lock.write();
        let removed = self.store.remove(&record_key(id))?;
        debug!(table = %self.name, id, removed, "record deleted");
        Ok(removed)
    }

    /// Remove `record` from the table; unsaved records are a no-op
    pub fn delete_record(&self, record: &Record) -> Result<bool> {
        match record.id() {
            Some(id) => self.delete(id),
            None => Ok(false),
        }
    }

    /// Delete every record, one at a time
    ///
    /// `last_id` and the indices are untouched, so ids keep increasing.
    pub fn delete_all(&self) -> Result<usize> {
        let mut cursor = self.store.cursor(Some(&record_key(0)[..]));
        let mut deleted = 0;

        loop {
            let _guard = self.lock.write();
            let Some((key, _)) = cursor.next() else {
                break;
            };
            if parse_record_key(&key).is_none() {
                break;
            }
            if self.store.remove(&key)? {
                deleted += 1;
            }
        }

        info!(table = %self.name, deleted, "all records deleted");
        Ok(deleted)
    }

    // =========================================================================
    // Counter and Raw Access
    // =========================================================================

    /// Highest id ever issued (0 if none)
    pub fn last_id(&self) -> Result<u64> {
        let _guard = self.lock.read();
        self.read_last_id()
    }

    /// Overwrite the id counter
    pub fn set_last_id(&self, id: u64) -> Result<()> {
        let _guard = self.lock.write();
        self.write_last_id(id)
    }

    /// Read a metadata key, bypassing the record codec
    pub fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.read();
        self.store.get(&meta_key(key))
    }

    /// Write a metadata key, bypassing the record codec
    pub fn raw_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _guard = self.lock.write();
        self.store.set(&meta_key(key), value)
    }

    // =========================================================================
    // Lifecycle and Introspection
    // =========================================================================

    /// Compact the table store and every index store
    pub fn compact(&self) -> Result<()> {
        let _guard = self.lock.write();
        self.store.compact()?;
        for index in self.indices.values() {
            index.compact()?;
        }
        Ok(())
    }

    /// Close the table and its indices, syncing everything to disk
    ///
    /// Every store is closed even if an earlier one fails; the first
    /// failure is returned.
    pub fn close(self) -> Result<()> {
        let Table {
            name,
            store,
            indices,
            ..
        } = self;

        let mut first_error = store.close().err();
        for (_, index) in indices {
            if let Err(e) = index.close() {
                first_error.get_or_insert(e);
            }
        }

        info!(table = %name, "table closed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared attributes in declaration order
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Names of indexed attributes
    pub fn indices(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    pub fn index_for(&self, attr: &str) -> Option<&Index> {
        self.indices.get(attr)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        let _guard = self.lock.read();
        let meta = self
            .store
            .cursor(Some(&[META_PREFIX][..]))
            .take_while(|(key, _)| key.first() == Some(&META_PREFIX))
            .count();
        self.store.len() - meta
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Private Helpers (callers hold `lock`)
    // =========================================================================

    fn check_declared(&self, attr: &str) -> Result<()> {
        if self.attributes.iter().any(|a| a == attr) {
            return Ok(());
        }
        Err(KvError::UndeclaredAttribute {
            table: self.name.clone(),
            attribute: attr.to_string(),
        })
    }

    /// Open indices not yet open; true if any were added
    fn open_indices(&mut self, attributes: &[&str]) -> Result<bool> {
        let mut added = false;
        for attr in attributes {
            if self.indices.contains_key(*attr) {
                continue;
            }
            let index = Index::open(&self.config, &self.name, attr)?;
            self.indices.insert(attr.to_string(), index);
            added = true;
        }
        Ok(added)
    }

    fn read_record(&self, id: u64) -> Result<Option<Record>> {
        match self.store.get(&record_key(id))? {
            Some(bytes) => {
                let attributes = codec::decode_attributes(&bytes)?;
                Ok(Some(Record::from_parts(id, attributes)))
            }
            None => Ok(None),
        }
    }

    fn read_last_id(&self) -> Result<u64> {
        match self.store.get(&meta_key(Self::LAST_ID_KEY.as_bytes()))? {
            Some(bytes) => parse_id(&bytes),
            None => Ok(0),
        }
    }

    fn write_last_id(&self, id: u64) -> Result<()> {
        self.store.set(
            &meta_key(Self::LAST_ID_KEY.as_bytes()),
            id.to_string().as_bytes(),
        )
    }
}
