//! Sorting, slicing and pagination links.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::storage::Row;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::validation("invalid_sort_order".to_string(), format!("Unknown sort order: {}", other))
                .with_detail("sort_order must be one of: asc, desc")),
        }
    }
}

/// Stable sort on the field's text; a missing field sorts as "". Descending
/// reverses the comparison, so equal keys keep their relative order either way.
pub fn sort_rows(rows: &mut [Row], field: &str, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord: Ordering = sort_key(a, field).cmp(sort_key(b, field));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn sort_key<'a>(row: &'a Row, field: &str) -> &'a str { row.get(field).map(String::as_str).unwrap_or("") }

/// Rows `[offset, offset + limit)`, clamped to what is available.
pub fn paginate(rows: Vec<Row>, offset: usize, limit: usize) -> Vec<Row> {
    rows.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    pub first: Option<String>,
    pub last: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
}

/// Request path and query pairs that every link reproduces; `offset` is
/// rewritten per link and `limit` pinned to the effective page size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkBase {
    path: String,
    params: Vec<(String, String)>,
}

impl LinkBase {
    pub fn new(path: impl Into<String>, raw_query: Option<&str>) -> Self {
        Self { path: path.into(), params: raw_query.map(parse_query_pairs).unwrap_or_default() }
    }

    pub fn link(&self, limit: usize, offset: usize) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.params.len() + 2);
        let mut saw_limit = false;
        for (k, v) in &self.params {
            match k.as_str() {
                "offset" => continue,
                "limit" => {
                    if saw_limit { continue; }
                    saw_limit = true;
                    parts.push(format!("limit={}", limit));
                }
                _ => parts.push(format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
            }
        }
        if !saw_limit { parts.push(format!("limit={}", limit)); }
        parts.push(format!("offset={}", offset));
        format!("{}?{}", self.path, parts.join("&"))
    }
}

/// Decode `a=1&b=x+y` style pairs; undecodable pairs are kept raw.
pub fn parse_query_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(s) => s.into_owned(),
        Err(_) => spaced,
    }
}

pub fn build_links(base: &LinkBase, total: usize, limit: usize, offset: usize) -> PageLinks {
    let limit = limit.max(1);
    let mut links = PageLinks::default();
    if total > 0 { links.first = Some(base.link(limit, 0)); }
    if total > limit { links.last = Some(base.link(limit, ((total - 1) / limit) * limit)); }
    if offset.saturating_add(limit) < total { links.next = Some(base.link(limit, offset + limit)); }
    if offset > 0 { links.prev = Some(base.link(limit, offset.saturating_sub(limit))); }
    links
}
