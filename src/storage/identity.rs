//! Row identity: every stored row carries a unique `id` cell.
//! Files written by other tools may lack the column or leave cells empty; they
//! are backfilled lazily, inside the lock, the first time a mutation touches
//! the dataset.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use super::csvio::{load_table, write_atomic};
use super::lock::DatasetLock;
use super::Table;
use crate::error::AppResult;
use crate::ident::lock_path_for;

pub const ID_COLUMN: &str = "id";

/// Fresh random (v4) identifier in canonical hyphenated form.
pub fn new_row_id() -> String { Uuid::new_v4().to_string() }

/// Append `id` to the header when absent and give every row with an empty or
/// missing `id` cell a fresh one. Returns how many rows were filled plus one
/// when the column itself was added, so zero means the table is unchanged.
pub fn assign_missing_ids(table: &mut Table) -> usize {
    let mut changed = 0;
    if !table.has_column(ID_COLUMN) {
        table.header.push(ID_COLUMN.to_string());
        changed += 1;
    }
    for row in table.rows.iter_mut() {
        let cell = row.entry(ID_COLUMN.to_string()).or_default();
        if cell.is_empty() {
            *cell = new_row_id();
            changed += 1;
        }
    }
    changed
}

/// Load the dataset with its ids repaired, rewriting the file when anything
/// had to be filled. The file is parsed once. A missing file yields an empty
/// table and is not created.
///
/// The caller must hold the dataset lock; the guard is taken as proof.
pub fn load_with_ids(path: &Path, lock: &DatasetLock) -> AppResult<Table> { backfill(path, lock).map(|(table, _)| table) }

/// Backfill the `id` column and empty id cells in place. Returns whether the
/// file was rewritten. Idempotent; a missing file is left alone.
pub fn ensure_id_column(path: &Path, lock: &DatasetLock) -> AppResult<bool> { backfill(path, lock).map(|(_, changed)| changed) }

fn backfill(path: &Path, lock: &DatasetLock) -> AppResult<(Table, bool)> {
    debug_assert_eq!(lock.path(), lock_path_for(path).as_path());
    if !path.exists() { return Ok((Table::default(), false)); }
    let mut table = load_table(path)?;
    let filled = assign_missing_ids(&mut table);
    if filled > 0 {
        write_atomic(path, &table.header, &table.rows)?;
        info!(target: "csvdata::storage", "backfilled ids for '{}' changes={} rows={}", path.display(), filled, table.rows.len());
    }
    Ok((table, filled > 0))
}
