use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{AppError, AppResult};

/// Write to a fresh temporary file in the destination's directory, then rename
/// it over the destination. On any failure the temporary file is removed and
/// the destination keeps its previous contents.
pub fn replace_atomic<F>(path: &Path, write: F) -> AppResult<()>
where
    F: FnOnce(&mut File) -> AppResult<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new().prefix(".").suffix(".tmp").tempfile_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::from(e.error))?;
    debug!(target: "csvdata::storage", "replaced '{}'", path.display());
    Ok(())
}

/// Whole-buffer variant of [`replace_atomic`].
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    replace_atomic(path, |f| {
        f.write_all(bytes)?;
        Ok(())
    })
}
