//! Records
//!
//! A record is an attribute map plus an optional id. The id is assigned by
//! `Table::save` the first time the record is saved and never changes after.

use std::collections::BTreeMap;
use std::fmt;

use crate::codec::Value;
use crate::error::{KvError, Result};
use crate::table::Table;

/// Attribute name → value
pub type Attributes = BTreeMap<String, Value>;

/// In-memory record, the unit of persistence
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: Option<u64>,
    values: Attributes,
}

impl Record {
    /// A new, unsaved record
    pub fn new() -> Self {
        Self::default()
    }

    /// A record that already lives in a table under `id`
    ///
    /// Used by typed wrappers that rebuild records from their own fields.
    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            values: Attributes::new(),
        }
    }

    pub(crate) fn from_parts(id: u64, values: Attributes) -> Self {
        Self {
            id: Some(id),
            values,
        }
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// Id, or `None` before the first save
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.values.get(attr)
    }

    /// Like `get`, but a missing attribute is a codec error
    pub fn require(&self, attr: &str) -> Result<&Value> {
        self.values
            .get(attr)
            .ok_or_else(|| KvError::Codec(format!("record is missing attribute '{}'", attr)))
    }

    /// Set an attribute, returning the previous value
    pub fn set(&mut self, attr: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(attr.into(), value.into())
    }

    /// Builder-style `set`
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(attr, value);
        self
    }

    pub fn remove(&mut self, attr: &str) -> Option<Value> {
        self.values.remove(attr)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.values
    }

    pub fn into_attributes(self) -> Attributes {
        self.values
    }

    /// Set `attr` and save the record again through `table`
    pub fn update(
        &mut self,
        table: &Table,
        attr: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<u64> {
        table.update(self, attr, value)
    }

    /// Remove this record from `table`
    pub fn delete(&self, table: &Table) -> Result<bool> {
        table.delete_record(self)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "#{}", id)?,
            None => write!(f, "#new")?,
        }
        for (attr, value) in &self.values {
            write!(f, " {}={}", attr, value)?;
        }
        Ok(())
    }
}
