//! CSV file primitives: header inspection, full load, text parse and atomic write.
//! The first record of a file is its header; later records are zipped against
//! it. Short records fill the missing trailing columns with "", surplus cells
//! beyond the header are dropped.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use tracing::debug;

use super::atomic::replace_atomic;
use super::{Row, Table};
use crate::error::{AppError, AppResult};

fn open_existing(path: &Path) -> AppResult<File> {
    match File::open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            Err(AppError::dataset_not_found(&name))
        }
        Err(e) => Err(e.into()),
    }
}

fn reader<R: Read>(src: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(src)
}

fn read_table<R: Read>(mut rdr: csv::Reader<R>) -> AppResult<Table> {
    let mut records = rdr.records();
    let header: Vec<String> = match records.next() {
        Some(rec) => rec?.iter().map(str::to_string).collect(),
        None => return Ok(Table::default()),
    };
    let mut rows = Vec::new();
    for rec in records {
        let rec = rec?;
        let mut row = Row::new();
        for (i, col) in header.iter().enumerate() {
            row.insert(col.clone(), rec.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }
    Ok(Table { header, rows })
}

/// Column names from the first line, in file order. An empty file yields no columns.
pub fn read_header(path: &Path) -> AppResult<Vec<String>> {
    let mut rdr = reader(open_existing(path)?);
    let mut rec = csv::StringRecord::new();
    if !rdr.read_record(&mut rec)? { return Ok(Vec::new()); }
    Ok(rec.iter().map(str::to_string).collect())
}

pub fn load_table(path: &Path) -> AppResult<Table> {
    let table = read_table(reader(open_existing(path)?))?;
    debug!(target: "csvdata::storage", "loaded '{}' columns={} rows={}", path.display(), table.header.len(), table.rows.len());
    Ok(table)
}

pub fn load_rows(path: &Path) -> AppResult<Vec<Row>> { Ok(load_table(path)?.rows) }

/// Parse CSV text (an upload) with the same rules as a dataset file.
pub fn parse_table(text: &str) -> AppResult<Table> {
    read_table(reader(text.as_bytes())).map_err(|e| match e {
        AppError::Internal { message, .. } => AppError::validation("invalid_csv", "Uploaded file is not valid CSV").with_detail(message),
        other => other,
    })
}

/// Replace the dataset file with `header` then one line per row, cells in
/// header order. Missing cells are written as ""; keys outside the header are ignored.
pub fn write_atomic(path: &Path, header: &[String], rows: &[Row]) -> AppResult<()> {
    replace_atomic(path, |file| {
        let mut w = csv::WriterBuilder::new().flexible(false).from_writer(&mut *file);
        w.write_record(header)?;
        for row in rows {
            w.write_record(header.iter().map(|col| row.get(col).map(String::as_str).unwrap_or("")))?;
        }
        w.flush()?;
        Ok(())
    })?;
    debug!(target: "csvdata::storage", "wrote '{}' columns={} rows={}", path.display(), header.len(), rows.len());
    Ok(())
}

/// Raw file bytes, for export.
pub fn read_bytes(path: &Path) -> AppResult<Vec<u8>> {
    let mut buf = Vec::new();
    open_existing(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}
