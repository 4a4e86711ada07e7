//! Dataset metadata side records (`<metadata_dir>/<name>.json`).
//! Known fields are typed; anything else a client or an older version stored
//! is kept verbatim in `extra` and written back on update.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::atomic::write_bytes_atomic;
use crate::error::AppResult;

pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    #[serde(default = "default_schema_version", deserialize_with = "version_or_null")]
    pub schema_version: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            schema_version: default_schema_version(),
            created_at: None,
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetadataUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema_version: Option<String>,
}

fn default_schema_version() -> String { DEFAULT_SCHEMA_VERSION.to_string() }

fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn version_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_schema_version))
}

/// ISO-8601 UTC with microseconds and a trailing `Z`.
pub fn timestamp(now: DateTime<Utc>) -> String { now.to_rfc3339_opts(SecondsFormat::Micros, true) }

/// Stored record, or defaults when the file is absent or unreadable.
pub fn load_metadata(path: &Path) -> DatasetMetadata {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return DatasetMetadata::default(),
        Err(e) => {
            warn!(target: "csvdata::storage", "metadata read failed '{}': {}", path.display(), e);
            return DatasetMetadata::default();
        }
    };
    match serde_json::from_slice::<DatasetMetadata>(&bytes) {
        Ok(m) => m,
        Err(e) => {
            warn!(target: "csvdata::storage", "metadata unreadable '{}': {}", path.display(), e);
            DatasetMetadata::default()
        }
    }
}

/// Merge `update` into the stored record, stamp `updated_at` (and `created_at`
/// on first write) and replace the file atomically.
pub fn save_metadata(path: &Path, update: &MetadataUpdate, now: DateTime<Utc>) -> AppResult<DatasetMetadata> {
    let mut meta = load_metadata(path);
    if let Some(d) = &update.description { meta.description = d.clone(); }
    if let Some(v) = &update.schema_version { meta.schema_version = v.clone(); }
    let stamp = timestamp(now);
    if meta.created_at.is_none() { meta.created_at = Some(stamp.clone()); }
    meta.updated_at = Some(stamp);
    if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
    let body = serde_json::to_vec_pretty(&meta)?;
    write_bytes_atomic(path, &body)?;
    Ok(meta)
}
