//! Exclusive advisory lock per dataset, backed by `<name>.csv.lock`.
//! The lock file is created on first use and never removed; holders block
//! until the lock is free. Release happens on drop, on every exit path.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::AppResult;

#[derive(Debug)]
pub struct DatasetLock {
    file: File,
    path: PathBuf,
}

impl DatasetLock {
    /// Block until the exclusive lock on `lock_path` is held.
    pub fn acquire(lock_path: &Path) -> AppResult<Self> {
        let file = OpenOptions::new().create(true).read(true).write(true).truncate(false).open(lock_path)?;
        file.lock_exclusive()?;
        debug!(target: "csvdata::storage", "lock acquired '{}'", lock_path.display());
        Ok(Self { file, path: lock_path.to_path_buf() })
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(target: "csvdata::storage", "unlock failed '{}': {}", self.path.display(), e);
        } else {
            debug!(target: "csvdata::storage", "lock released '{}'", self.path.display());
        }
    }
}
