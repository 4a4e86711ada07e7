//! Dataset identifier sanitization and path resolution utilities
//! ------------------------------------------------------------
//! Single source of truth for turning an externally supplied dataset name into
//! the file names used on disk. Names are restricted to ASCII letters, digits,
//! underscore and hyphen, which rules out path traversal and separators.

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

pub const DATASET_EXT: &str = "csv";
pub const LOCK_SUFFIX: &str = ".lock";
pub const METADATA_EXT: &str = "json";

/// Validate a dataset name and return its canonical form.
/// - A trailing `.csv` (any case) is stripped
/// - The remainder must be non-empty and match `[A-Za-z0-9_-]+`
pub fn sanitize_dataset_name(name: &str) -> AppResult<String> {
    let trimmed = match name.len().checked_sub(4) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".csv") => &name[..cut],
        _ => name,
    };
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::invalid_name(
            "invalid_name",
            "Dataset name can only contain letters, numbers, underscore (_), and hyphen (-)",
        ));
    }
    Ok(trimmed.to_string())
}

/// `<name>.csv`
pub fn dataset_file_name(name: &str) -> String { format!("{}.{}", name, DATASET_EXT) }

/// Data file for a sanitized name under `data_dir`.
pub fn dataset_path(data_dir: &Path, name: &str) -> PathBuf { data_dir.join(dataset_file_name(name)) }

/// Sibling lock file: `<name>.csv.lock`. Never read for data.
pub fn lock_path_for(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_os_string();
    os.push(LOCK_SUFFIX);
    PathBuf::from(os)
}

/// Metadata side record: `<metadata_dir>/<name>.json`.
pub fn metadata_path(metadata_dir: &Path, name: &str) -> PathBuf {
    metadata_dir.join(format!("{}.{}", name, METADATA_EXT))
}

/// True when a directory entry name looks like a dataset file.
pub fn is_dataset_file_name(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".csv") && lower.len() > 4
}
