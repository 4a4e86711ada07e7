//!
//! csvdata storage module
//! ----------------------
//! On-disk layout: one comma-delimited UTF-8 file per dataset, `<name>.csv`,
//! header first, under the configured data directory. Alongside each data file
//! lives an advisory lock file `<name>.csv.lock`; an optional JSON side record
//! `<name>.json` lives under the metadata directory.
//!
//! Key responsibilities:
//! - Header inspection, whole-file row load and atomic replace (`csvio`, `atomic`).
//! - Per-dataset exclusive locking across threads and cooperating processes (`lock`).
//! - Lazy backfill of the `id` column for legacy files (`identity`).
//! - Header unification when heterogeneous rows are merged (`schema`).
//! - Dataset metadata side records (`metadata`).
//!
//! Every value on disk is a string. Rows are plain maps; column order is owned
//! by the table header.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::config::DEFAULT_MAX_BULK;
use crate::error::AppResult;
use crate::ident;

pub mod atomic;
pub mod csvio;
pub mod identity;
pub mod lock;
pub mod metadata;
pub mod schema;

pub use csvio::{load_rows, load_table, parse_table, read_header, write_atomic};
pub use identity::{assign_missing_ids, ensure_id_column, load_with_ids, new_row_id, ID_COLUMN};
pub use lock::DatasetLock;
pub use schema::{normalize_rows, unify_headers};

/// One stored row: column name → cell text.
pub type Row = BTreeMap<String, String>;

/// Header plus rows, as read from or written to a dataset file.
///
/// Serializes as a JSON array of row objects whose keys follow header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Row>) -> Self { Self { header, rows } }

    pub fn has_column(&self, name: &str) -> bool { self.header.iter().any(|h| h == name) }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.get(ID_COLUMN).map(String::as_str) == Some(id))
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowView { header: &self.header, row })?;
        }
        seq.end()
    }
}

/// A single row paired with the header that orders it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: Vec<String>,
    pub row: Row,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> { self.row.get(column).map(String::as_str) }

    pub fn id(&self) -> Option<&str> { self.get(ID_COLUMN) }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RowView { header: &self.header, row: &self.row }.serialize(serializer)
    }
}

/// Borrowed row serialized in header order; header columns absent from the row
/// render as "", keys outside the header follow in key order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub header: &'a [String],
    pub row: &'a Row,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.header.len()))?;
        for col in self.header {
            map.serialize_entry(col, self.row.get(col).map(String::as_str).unwrap_or(""))?;
        }
        for (k, v) in self.row {
            if !self.header.iter().any(|h| h == k) { map.serialize_entry(k, v)?; }
        }
        map.end()
    }
}

/// Root handle for a data directory and its metadata directory.
///
/// Cheap to clone; carries no in-process row cache, every request re-reads
/// the dataset file.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
    metadata_dir: PathBuf,
    max_bulk_items: usize,
}

impl Store {
    /// Create a new Store; both directories are created if they do not exist.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, metadata_dir: Q) -> AppResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let metadata_dir = metadata_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&metadata_dir)?;
        debug!(target: "csvdata::storage", "store opened data_dir='{}' metadata_dir='{}'", data_dir.display(), metadata_dir.display());
        Ok(Self { data_dir, metadata_dir, max_bulk_items: DEFAULT_MAX_BULK })
    }

    pub fn with_max_bulk_items(mut self, max: usize) -> Self {
        self.max_bulk_items = max.max(1);
        self
    }

    pub fn data_dir(&self) -> &Path { &self.data_dir }

    pub fn metadata_dir(&self) -> &Path { &self.metadata_dir }

    pub fn max_bulk_items(&self) -> usize { self.max_bulk_items }

    /// Sorted dataset file names (`<name>.csv`) present in the data directory.
    pub fn list_datasets(&self) -> AppResult<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) { continue; }
            let name = entry.file_name().to_string_lossy().to_string();
            if ident::is_dataset_file_name(&name) { out.push(name); }
        }
        out.sort();
        Ok(out)
    }

    /// Write-and-remove probe used by the readiness check.
    pub fn probe_writable(&self) -> bool {
        let probe = self.data_dir.join(".health_check");
        let ok = fs::write(&probe, b"ok").is_ok();
        let _ = fs::remove_file(&probe);
        ok
    }
}
