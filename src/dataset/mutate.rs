//! Lock-scoped read-modify-write operations.
//!
//! Each public operation takes the dataset lock exactly once, backfills the
//! `id` column when the file exists, loads header and rows, computes the new
//! table in memory and replaces the file with one atomic write. The guard is
//! released on drop, so every return path (including `?`) unlocks.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Dataset, RowPayload};
use crate::error::{AppError, AppResult};
use crate::storage::{self, assign_missing_ids, csvio, new_row_id, normalize_rows, unify_headers, DatasetLock, Record, Row, Table, ID_COLUMN};

#[derive(Debug, Clone, Serialize)]
pub struct BulkCreated {
    pub created: usize,
    pub rows: Table,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdated {
    pub updated: usize,
    pub rows: Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkDeleted {
    pub deleted: usize,
    pub requested: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Append,
    Replace,
}

impl std::str::FromStr for ImportMode {
    type Err = AppError;
    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "append" => Ok(ImportMode::Append),
            "replace" => Ok(ImportMode::Replace),
            other => Err(AppError::validation("invalid_mode".to_string(), format!("Unknown import mode: {}", other))
                .with_detail("mode must be one of: append, replace")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportOutcome {
    Replaced { rows: usize },
    Appended { imported: usize, total: usize },
}

impl Dataset {
    /// Current table with the `id` column guaranteed; empty when the file is absent.
    fn load_locked(&self, lock: &DatasetLock) -> AppResult<Table> {
        storage::load_with_ids(&self.path, lock)
    }

    fn persist(&self, table: &Table) -> AppResult<()> { csvio::write_atomic(&self.path, &table.header, &table.rows) }

    fn check_batch(&self, len: usize) -> AppResult<()> {
        if len == 0 {
            return Err(AppError::validation("bulk_empty", "Bulk request must contain at least one item"));
        }
        if len > self.max_bulk_items {
            return Err(AppError::validation("bulk_too_large".to_string(), format!("Bulk request exceeds {} items", self.max_bulk_items))
                .with_detail(format!("items: {} > {}", len, self.max_bulk_items)));
        }
        Ok(())
    }

    /// Insert one row. A missing dataset is created with the payload's keys as
    /// its header (plus `id`).
    pub fn create_row(&self, payload: RowPayload) -> AppResult<Record> {
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let added = append_payloads(&mut table, vec![payload])?;
        self.persist(&table)?;
        let row = table.rows.swap_remove(added.start);
        info!(target: "csvdata::dataset", dataset = %self.name, id = row.get(ID_COLUMN).map(String::as_str).unwrap_or(""), "row created");
        Ok(Record { header: table.header, row })
    }

    /// Overwrite the payload's fields on the row with `id`; new fields extend the header.
    pub fn update_row(&self, id: &str, payload: RowPayload) -> AppResult<Record> {
        self.require_exists()?;
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let idx = table.position_of(id).ok_or_else(|| AppError::row_not_found(id))?;
        apply_update(&mut table, idx, &payload);
        self.persist(&table)?;
        let row = table.rows.swap_remove(idx);
        info!(target: "csvdata::dataset", dataset = %self.name, id, "row updated");
        Ok(Record { header: table.header, row })
    }

    /// Remove every row carrying `id`; not-found only when nothing was removed.
    pub fn delete_row(&self, id: &str) -> AppResult<()> {
        self.require_exists()?;
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let before = table.rows.len();
        table.rows.retain(|r| r.get(ID_COLUMN).map(String::as_str) != Some(id));
        if table.rows.len() == before { return Err(AppError::row_not_found(id)); }
        self.persist(&table)?;
        info!(target: "csvdata::dataset", dataset = %self.name, id, removed = before - table.rows.len(), "row deleted");
        Ok(())
    }

    pub fn bulk_create(&self, payloads: Vec<RowPayload>) -> AppResult<BulkCreated> {
        self.check_batch(payloads.len())?;
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let added = append_payloads(&mut table, payloads)?;
        self.persist(&table)?;
        let rows: Vec<Row> = table.rows.drain(added).collect();
        info!(target: "csvdata::dataset", dataset = %self.name, created = rows.len(), "bulk create");
        Ok(BulkCreated { created: rows.len(), rows: Table::new(table.header, rows) })
    }

    /// Apply each update that names an existing row. Entries without a usable
    /// `id`, or naming an unknown one, are skipped. `updated` counts applied
    /// entries; `rows` holds each touched row once, in first-touch order.
    pub fn bulk_update(&self, updates: Vec<RowPayload>) -> AppResult<BulkUpdated> {
        self.check_batch(updates.len())?;
        self.require_exists()?;
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let mut applied = 0usize;
        let mut touched: Vec<usize> = Vec::new();
        for update in &updates {
            let Some(id) = update.id_cell() else { continue };
            let Some(idx) = table.position_of(&id) else {
                debug!(target: "csvdata::dataset", dataset = %self.name, id = %id, "bulk update skipped unknown id");
                continue;
            };
            apply_update(&mut table, idx, update);
            applied += 1;
            if !touched.contains(&idx) { touched.push(idx); }
        }
        if applied > 0 { self.persist(&table)?; }
        let rows: Vec<Row> = touched.iter().map(|&i| table.rows[i].clone()).collect();
        info!(target: "csvdata::dataset", dataset = %self.name, requested = updates.len(), updated = applied, "bulk update");
        Ok(BulkUpdated { updated: applied, rows: Table::new(table.header, rows) })
    }

    pub fn bulk_delete(&self, ids: Vec<String>) -> AppResult<BulkDeleted> {
        self.check_batch(ids.len())?;
        self.require_exists()?;
        let guard = self.lock()?;
        let mut table = self.load_locked(&guard)?;
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = table.rows.len();
        table.rows.retain(|r| !r.get(ID_COLUMN).map(|id| doomed.contains(id.as_str())).unwrap_or(false));
        let deleted = before - table.rows.len();
        if deleted > 0 { self.persist(&table)?; }
        info!(target: "csvdata::dataset", dataset = %self.name, requested = ids.len(), deleted, "bulk delete");
        Ok(BulkDeleted { deleted, requested: ids.len() })
    }

    /// Load uploaded CSV bytes. Replace (or append onto a missing dataset)
    /// writes the upload as the whole dataset; append merges both sides onto
    /// the union header. Either way every incoming row ends up with a unique,
    /// non-empty id.
    pub fn import(&self, bytes: &[u8], mode: ImportMode) -> AppResult<ImportOutcome> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            AppError::encoding("unsupported_encoding".to_string(), format!("Uploaded file must be UTF-8 encoded: {}", e))
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut incoming = csvio::parse_table(text)?;
        incoming.header = unify_headers(&[], &incoming.header);

        let guard = self.lock()?;
        if mode == ImportMode::Replace || !self.exists() {
            claim_import_ids(&mut incoming, &mut HashSet::new())?;
            self.persist(&incoming)?;
            info!(target: "csvdata::dataset", dataset = %self.name, rows = incoming.rows.len(), ?mode, "import replaced");
            return Ok(ImportOutcome::Replaced { rows: incoming.rows.len() });
        }

        let mut table = self.load_locked(&guard)?;
        let mut taken: HashSet<String> = table.rows.iter().filter_map(|r| r.get(ID_COLUMN)).filter(|s| !s.is_empty()).cloned().collect();
        claim_import_ids(&mut incoming, &mut taken)?;
        let imported = incoming.rows.len();
        table.header = unify_headers(&table.header, &incoming.header);
        table.rows.append(&mut incoming.rows);
        normalize_rows(&mut table.rows, &table.header);
        self.persist(&table)?;
        info!(target: "csvdata::dataset", dataset = %self.name, imported, total = table.rows.len(), "import appended");
        Ok(ImportOutcome::Appended { imported, total: table.rows.len() })
    }
}

/// Give uploaded rows ids: `id` joins the header when absent, empty cells get
/// a fresh id, and an id already in `taken` (or repeated in the upload) is a
/// conflict.
fn claim_import_ids(incoming: &mut Table, taken: &mut HashSet<String>) -> AppResult<()> {
    assign_missing_ids(incoming);
    for row in &incoming.rows {
        let id = row.get(ID_COLUMN).map(String::as_str).unwrap_or("");
        if !taken.insert(id.to_string()) {
            return Err(AppError::conflict("duplicate_id".to_string(), format!("Imported row reuses an existing id: {}", id)));
        }
    }
    Ok(())
}

/// Append payloads as new rows, assigning ids and growing the header.
/// Returns the index range of the new rows.
fn append_payloads(table: &mut Table, payloads: Vec<RowPayload>) -> AppResult<Range<usize>> {
    let mut taken: HashSet<String> = table.rows.iter().filter_map(|r| r.get(ID_COLUMN)).filter(|s| !s.is_empty()).cloned().collect();
    let start = table.rows.len();
    for payload in payloads {
        let id = match payload.id_cell() {
            Some(id) => id,
            None => new_row_id(),
        };
        if !taken.insert(id.clone()) {
            return Err(AppError::conflict("duplicate_id".to_string(), format!("A row with id {} already exists", id)));
        }
        let mut row = Row::new();
        for (k, v) in payload.iter() {
            if k != ID_COLUMN { row.insert(k.to_string(), v.to_cell()); }
        }
        row.insert(ID_COLUMN.to_string(), id);
        table.header = unify_headers(&table.header, payload.keys().chain(std::iter::once(ID_COLUMN)));
        table.rows.push(row);
    }
    let end = table.rows.len();
    normalize_rows(&mut table.rows[start..end], &table.header);
    Ok(start..end)
}

/// Write the payload's fields (except `id`) onto row `idx` and grow the header.
fn apply_update(table: &mut Table, idx: usize, payload: &RowPayload) {
    table.header = unify_headers(&table.header, payload.keys().filter(|k| *k != ID_COLUMN));
    let row = &mut table.rows[idx];
    for (k, v) in payload.iter() {
        if k != ID_COLUMN { row.insert(k.to_string(), v.to_cell()); }
    }
    normalize_rows(std::slice::from_mut(row), &table.header);
}
