//! kvrecord CLI
//!
//! Command-line interface for inspecting and editing tables in a data
//! directory.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use kvrecord::wal::WalRecovery;
use kvrecord::{Config, Record, Result, Table, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// kvrecord CLI
#[derive(Parser, Debug)]
#[command(name = "kvrecord-cli")]
#[command(about = "CLI for kvrecord tables")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = kvrecord::config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print records in id order
    Dump {
        table: String,

        /// First id to print
        #[arg(short, long)]
        start: Option<u64>,

        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print one record
    Get { table: String, id: u64 },

    /// Print one page of records
    Page {
        table: String,

        /// 1-based page number
        page: u64,

        #[arg(short, long, default_value_t = Table::DEFAULT_PER_PAGE)]
        per_page: usize,
    },

    /// Save a new record from attr=value pairs
    ///
    /// Values: null, true/false, integers, floats, :symbol,
    /// @RFC3339 timestamp, anything else is text.
    Insert {
        table: String,

        #[arg(required = true)]
        pairs: Vec<String>,

        /// Attributes to start indexing; earlier ones stay indexed
        #[arg(short, long)]
        index: Vec<String>,
    },

    /// Look a record up through an attribute index
    FindBy {
        table: String,
        attribute: String,
        value: String,
    },

    /// Print the table's id counter
    LastId { table: String },

    /// Delete one record
    Delete { table: String, id: u64 },

    /// Rewrite a table's files without dead entries
    Compact { table: String },

    /// Check a store file's log without modifying it
    Verify { file: PathBuf },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvrecord=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder().data_dir(&args.data_dir).build();

    match args.command {
        Commands::Dump {
            table,
            start,
            limit,
        } => {
            let table = Table::open_with_config(config, &table, &[])?;
            table.scan(start, limit, |record| println!("{}", record))?;
            table.close()
        }
        Commands::Get { table, id } => {
            let table = Table::open_with_config(config, &table, &[])?;
            match table.find(id)? {
                Some(record) => println!("{}", record),
                None => println!("(not found)"),
            }
            table.close()
        }
        Commands::Page {
            table,
            page,
            per_page,
        } => {
            let table = Table::open_with_config(config, &table, &[])?;
            table.scan_page(page, per_page, |record| println!("{}", record))?;
            table.close()
        }
        Commands::Insert {
            table,
            pairs,
            index,
        } => {
            let mut record = Record::new();
            for pair in &pairs {
                let (attr, value) = split_pair(pair)?;
                record.set(attr, parse_value(value));
            }

            let attrs: Vec<&str> = record.attributes().keys().map(String::as_str).collect();
            let mut table = Table::open_with_config(config, &table, &attrs)?;
            let indexed: Vec<&str> = index.iter().map(String::as_str).collect();
            table.define(&indexed)?;
            table.index(&indexed)?;

            let id = table.save(&mut record)?;
            println!("{}", id);
            table.close()
        }
        Commands::FindBy {
            table,
            attribute,
            value,
        } => {
            let table = Table::open_with_config(config, &table, &[])?;
            match table.find_by(&attribute, parse_value(&value))? {
                Some(record) => println!("{}", record),
                None => println!("(not found)"),
            }
            table.close()
        }
        Commands::LastId { table } => {
            let table = Table::open_with_config(config, &table, &[])?;
            println!("{}", table.last_id()?);
            table.close()
        }
        Commands::Delete { table, id } => {
            let table = Table::open_with_config(config, &table, &[])?;
            let removed = table.delete(id)?;
            println!("{}", if removed { "deleted" } else { "(not found)" });
            table.close()
        }
        Commands::Compact { table } => {
            let table = Table::open_with_config(config, &table, &[])?;
            table.compact()?;
            table.close()
        }
        Commands::Verify { file } => {
            let result = WalRecovery::verify(&file)?;
            println!("entries_recovered: {}", result.entries_recovered);
            println!("entries_corrupted: {}", result.entries_corrupted);
            println!("last_lsn:          {}", result.last_lsn);
            println!("damaged_tail:      {}", result.was_truncated);
            Ok(())
        }
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=').ok_or_else(|| {
        kvrecord::KvError::Config(format!("expected attr=value, got {:?}", pair))
    })
}

/// Interpret a command-line literal as an attribute value
fn parse_value(raw: &str) -> Value {
    if raw == "null" {
        return Value::Null;
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    if let Some(sym) = raw.strip_prefix(':') {
        if !sym.is_empty() {
            return Value::symbol(sym);
        }
    }
    if let Some(ts) = raw.strip_prefix('@') {
        if let Ok(t) = DateTime::parse_from_rfc3339(ts) {
            return Value::Timestamp(t.with_timezone(&Utc));
        }
    }
    Value::from(raw)
}
