//! Typed models
//!
//! `Model` maps a Rust struct onto a record; `Repository` wraps the table
//! for that struct so callers deal in their own types instead of records.
//!
//! ```no_run
//! use kvrecord::{Config, Model, Record, Repository, Result};
//!
//! struct User {
//!     id: Option<u64>,
//!     username: String,
//! }
//!
//! impl Model for User {
//!     const TABLE: &'static str = "User";
//!     const ATTRIBUTES: &'static [&'static str] = &["username"];
//!     const INDEXED: &'static [&'static str] = &["username"];
//!
//!     fn id(&self) -> Option<u64> {
//!         self.id
//!     }
//!
//!     fn set_id(&mut self, id: u64) {
//!         self.id = Some(id);
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         Record::new().with("username", self.username.as_str())
//!     }
//!
//!     fn from_record(record: Record) -> Result<Self> {
//!         let username = record.require("username")?.to_string();
//!         Ok(User { id: record.id(), username })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let users = Repository::<User>::open(Config::default())?;
//! let mut user = User { id: None, username: "David".into() };
//! users.save(&mut user)?;
//! assert!(users.find_by("username", "David")?.is_some());
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;

use crate::codec::Value;
use crate::config::Config;
use crate::error::Result;
use crate::record::Record;
use crate::table::Table;

/// A struct persisted as records of one table
pub trait Model: Sized {
    /// Table name (also the data file's stem)
    const TABLE: &'static str;

    /// Declared attributes
    const ATTRIBUTES: &'static [&'static str];

    /// Attributes to keep a value → id index for
    const INDEXED: &'static [&'static str] = &[];

    fn id(&self) -> Option<u64>;

    fn set_id(&mut self, id: u64);

    /// Attribute map for this value (the id is carried separately)
    fn to_record(&self) -> Record;

    fn from_record(record: Record) -> Result<Self>;
}

/// Typed access to the table behind model `M`
pub struct Repository<M: Model> {
    table: Table,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Repository<M> {
    /// Open the model's table and its indices
    pub fn open(config: Config) -> Result<Self> {
        let mut table = Table::open_with_config(config, M::TABLE, M::ATTRIBUTES)?;
        table.index(M::INDEXED)?;
        Ok(Self {
            table,
            _model: PhantomData,
        })
    }

    /// Save `model`, writing the assigned id back into it
    pub fn save(&self, model: &mut M) -> Result<u64> {
        let mut record = match model.id() {
            Some(id) => {
                let mut record = Record::with_id(id);
                for (attr, value) in model.to_record().into_attributes() {
                    record.set(attr, value);
                }
                record
            }
            None => model.to_record(),
        };

        let id = self.table.save(&mut record)?;
        model.set_id(id);
        Ok(id)
    }

    pub fn find(&self, id: u64) -> Result<Option<M>> {
        self.table.find(id)?.map(M::from_record).transpose()
    }

    pub fn find_by(&self, attr: &str, value: impl Into<Value>) -> Result<Option<M>> {
        self.table.find_by(attr, value)?.map(M::from_record).transpose()
    }

    /// Visit models in ascending id order; see `Table::scan`
    pub fn scan<F>(&self, start: Option<u64>, limit: Option<usize>, mut visit: F) -> Result<usize>
    where
        F: FnMut(M),
    {
        self.table
            .try_scan(start, limit, |record| M::from_record(record).map(&mut visit))
    }

    pub fn delete(&self, model: &M) -> Result<bool> {
        match model.id() {
            Some(id) => self.table.delete(id),
            None => Ok(false),
        }
    }

    /// Underlying table
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn close(self) -> Result<()> {
        self.table.close()
    }
}
