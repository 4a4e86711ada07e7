//!
//! csvdata query pipeline
//! ----------------------
//! Request-scoped transformation of a dataset's rows, always in this order:
//! free-text search, field filter, total capture, stable sort, offset/limit
//! slice, pagination links. Pure over in-memory rows; the caller loads them.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PAGE_LIMIT;
use crate::error::{AppError, AppResult};
use crate::storage::{Row, Table};

mod dates;
pub mod filter;
pub mod page;

pub use dates::parse_timestamp;
pub use filter::{apply_field_filter, apply_search, matches_search, CompiledFilter, FilterSpec, Operator, Predicate};
pub use page::{build_links, paginate, parse_query_pairs, sort_rows, LinkBase, PageLinks, SortOrder};

/// Raw query-string parameters as they arrive on `GET /datasets/{name}/rows`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryParams {
    pub search: Option<String>,
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Validated query.
#[derive(Debug, Clone, PartialEq)]
pub struct RowQuery {
    pub search: Option<String>,
    pub filter: Option<FilterSpec>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for RowQuery {
    fn default() -> Self {
        Self { search: None, filter: None, sort_by: None, sort_order: SortOrder::Asc, limit: DEFAULT_PAGE_LIMIT, offset: 0 }
    }
}

impl RowQuery {
    /// Validate raw parameters. The filter applies only when field, operator and
    /// value are all supplied; an operator is validated whenever it is present.
    pub fn from_params(params: QueryParams, default_limit: usize, max_limit: usize) -> AppResult<Self> {
        let limit = match params.limit {
            None => default_limit,
            Some(n) if n >= 1 && (n as u64) <= max_limit as u64 => n as usize,
            Some(n) => {
                return Err(AppError::validation("invalid_limit".to_string(), format!("limit must be between 1 and {}", max_limit))
                    .with_detail(format!("limit: {}", n)));
            }
        };
        let offset = match params.offset {
            None => 0,
            Some(n) if n >= 0 => n as usize,
            Some(n) => {
                return Err(AppError::validation("invalid_offset", "offset must be zero or greater").with_detail(format!("offset: {}", n)));
            }
        };
        let sort_order = match params.sort_order.as_deref() {
            None => SortOrder::Asc,
            Some(s) => s.parse()?,
        };
        let operator: Option<Operator> = params.operator.as_deref().map(|s| s.parse::<Operator>()).transpose()?;
        let filter = match (params.field, operator, params.value) {
            (Some(field), Some(op), Some(value)) if !field.is_empty() => Some(FilterSpec { field, op, value }),
            _ => None,
        };
        Ok(Self {
            search: params.search.filter(|s| !s.is_empty()),
            filter,
            sort_by: params.sort_by.filter(|s| !s.is_empty()),
            sort_order,
            limit,
            offset,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage {
    pub total: usize,
    pub rows: Table,
    pub limit: usize,
    pub offset: usize,
    pub links: PageLinks,
}

/// Run the pipeline over a loaded table.
pub fn run_query(table: Table, query: &RowQuery, base: &LinkBase) -> QueryPage {
    let Table { header, rows } = table;
    let (total, rows) = select(rows, query);
    QueryPage {
        total,
        rows: Table::new(header, rows),
        limit: query.limit,
        offset: query.offset,
        links: build_links(base, total, query.limit, query.offset),
    }
}

/// Search, filter, sort and slice; returns the post-filter total and the page.
pub fn select(mut rows: Vec<Row>, query: &RowQuery) -> (usize, Vec<Row>) {
    if let Some(needle) = &query.search { rows = apply_search(rows, needle); }
    if let Some(spec) = &query.filter { rows = apply_field_filter(rows, spec); }
    let total = rows.len();
    if let Some(field) = &query.sort_by { sort_rows(&mut rows, field, query.sort_order); }
    (total, paginate(rows, query.offset, query.limit))
}

#[cfg(test)]
mod tests;
