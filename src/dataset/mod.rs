//! Dataset handle: one named CSV file plus its lock and metadata record.
//! Reads go straight to the file without locking and see either the previous
//! or the next complete file state. Every mutation runs as a single
//! read-modify-write cycle inside the dataset lock (see `mutate`).

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::ident;
use crate::storage::metadata::{self, DatasetMetadata, MetadataUpdate};
use crate::storage::{csvio, DatasetLock, Store, Table};

mod mutate;
pub mod payload;

pub use mutate::{BulkCreated, BulkDeleted, BulkUpdated, ImportMode, ImportOutcome};
pub use payload::{FieldValue, RowPayload};

#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    path: PathBuf,
    lock_path: PathBuf,
    metadata_path: PathBuf,
    max_bulk_items: usize,
}

impl Store {
    /// Resolve an external dataset name; fails with `invalid_name` before any
    /// file access when the name is unsafe.
    pub fn dataset(&self, name: &str) -> AppResult<Dataset> {
        let name = ident::sanitize_dataset_name(name)?;
        let path = ident::dataset_path(self.data_dir(), &name);
        Ok(Dataset {
            lock_path: ident::lock_path_for(&path),
            metadata_path: ident::metadata_path(self.metadata_dir(), &name),
            path,
            name,
            max_bulk_items: self.max_bulk_items(),
        })
    }
}

impl Dataset {
    pub fn name(&self) -> &str { &self.name }

    pub fn path(&self) -> &Path { &self.path }

    pub fn file_name(&self) -> String { ident::dataset_file_name(&self.name) }

    pub fn exists(&self) -> bool { self.path.is_file() }

    pub(crate) fn require_exists(&self) -> AppResult<()> {
        if !self.exists() { return Err(AppError::dataset_not_found(&self.name)); }
        Ok(())
    }

    /// Column names in file order.
    pub fn schema(&self) -> AppResult<Vec<String>> { csvio::read_header(&self.path) }

    pub fn load(&self) -> AppResult<Table> { csvio::load_table(&self.path) }

    /// File bytes as stored, for CSV export.
    pub fn raw_bytes(&self) -> AppResult<Vec<u8>> { csvio::read_bytes(&self.path) }

    pub(crate) fn lock(&self) -> AppResult<DatasetLock> { DatasetLock::acquire(&self.lock_path) }

    /// Stored metadata, or defaults when none has been written.
    pub fn metadata(&self) -> AppResult<DatasetMetadata> {
        self.require_exists()?;
        Ok(metadata::load_metadata(&self.metadata_path))
    }

    pub fn update_metadata(&self, update: &MetadataUpdate) -> AppResult<DatasetMetadata> {
        self.require_exists()?;
        let _guard = self.lock()?;
        metadata::save_metadata(&self.metadata_path, update, Utc::now())
    }
}
