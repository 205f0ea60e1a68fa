//! Log format, writer, reader, and recovery tests

mod reader_tests;
mod writer_tests;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use kvrecord::wal::{WalEntry, MAGIC, VERSION};

/// Write a file header followed by raw serialized entries (for crafting corruption)
pub fn write_raw_log(path: &Path, entries: &[WalEntry], trailer: &[u8]) {
    let mut file = File::create(path).unwrap();
    file.write_all(MAGIC).unwrap();
    file.write_all(&VERSION.to_le_bytes()).unwrap();
    for entry in entries {
        file.write_all(&entry.serialize().unwrap()).unwrap();
    }
    file.write_all(trailer).unwrap();
    file.sync_all().unwrap();
}
