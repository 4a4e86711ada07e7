//! Field filter operators and free-text search.
//!
//! A `(field, operator, value)` triple is compiled once per request into a
//! [`Predicate`]; evaluation never fails. Operands that cannot match (a bad
//! regex, a non-numeric bound, a malformed date range) compile to
//! [`Predicate::Never`], and cells that fail to parse simply do not match.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dates::parse_timestamp;
use crate::error::AppError;
use crate::storage::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    DateAfter,
    DateBefore,
    DateBetween,
}

impl Operator {
    pub const ALL: [Operator; 16] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::NotIn,
        Operator::DateAfter,
        Operator::DateBefore,
        Operator::DateBetween,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Regex => "regex",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::DateAfter => "date_after",
            Operator::DateBefore => "date_before",
            Operator::DateBetween => "date_between",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Operator {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, AppError> {
        Operator::ALL.iter().copied().find(|op| op.as_str() == s).ok_or_else(|| {
            let names: Vec<&str> = Operator::ALL.iter().map(Operator::as_str).collect();
            AppError::validation("invalid_operator".to_string(), format!("Unknown filter operator: {}", s))
                .with_detail(format!("operator must be one of: {}", names.join(", ")))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison { Gt, Gte, Lt, Lte }

impl Comparison {
    fn holds(self, cell: f64, bound: f64) -> bool {
        match self {
            Comparison::Gt => cell > bound,
            Comparison::Gte => cell >= bound,
            Comparison::Lt => cell < bound,
            Comparison::Lte => cell <= bound,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Equals(String),
    NotEquals(String),
    /// Needles are stored lowercased.
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    Pattern(Regex),
    Numeric(Comparison, f64),
    Member(Vec<String>),
    NotMember(Vec<String>),
    After(DateTime<Utc>),
    Before(DateTime<Utc>),
    Between(DateTime<Utc>, DateTime<Utc>),
    Never,
}

fn parse_number(raw: &str) -> Option<f64> { raw.trim().parse::<f64>().ok() }

fn split_list(raw: &str) -> Vec<String> { raw.split(',').map(|s| s.trim().to_string()).collect() }

impl Predicate {
    pub fn compile(op: Operator, value: &str) -> Predicate {
        match op {
            Operator::Eq => Predicate::Equals(value.to_string()),
            Operator::Ne => Predicate::NotEquals(value.to_string()),
            Operator::Contains => Predicate::Contains(value.to_lowercase()),
            Operator::NotContains => Predicate::NotContains(value.to_lowercase()),
            Operator::StartsWith => Predicate::StartsWith(value.to_lowercase()),
            Operator::EndsWith => Predicate::EndsWith(value.to_lowercase()),
            Operator::Regex => match RegexBuilder::new(value).case_insensitive(true).build() {
                Ok(re) => Predicate::Pattern(re),
                Err(e) => {
                    debug!(target: "csvdata::query", "regex filter does not compile, matching nothing: {}", e);
                    Predicate::Never
                }
            },
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let cmp = match op {
                    Operator::Gt => Comparison::Gt,
                    Operator::Gte => Comparison::Gte,
                    Operator::Lt => Comparison::Lt,
                    _ => Comparison::Lte,
                };
                match parse_number(value) {
                    Some(bound) => Predicate::Numeric(cmp, bound),
                    None => Predicate::Never,
                }
            }
            Operator::In => Predicate::Member(split_list(value)),
            Operator::NotIn => Predicate::NotMember(split_list(value)),
            Operator::DateAfter => parse_timestamp(value).map(Predicate::After).unwrap_or(Predicate::Never),
            Operator::DateBefore => parse_timestamp(value).map(Predicate::Before).unwrap_or(Predicate::Never),
            Operator::DateBetween => {
                let parts = split_list(value);
                if parts.len() != 2 { return Predicate::Never; }
                match (parse_timestamp(&parts[0]), parse_timestamp(&parts[1])) {
                    (Some(start), Some(end)) => Predicate::Between(start, end),
                    _ => Predicate::Never,
                }
            }
        }
    }

    pub fn matches(&self, cell: &str) -> bool {
        match self {
            Predicate::Equals(v) => cell == v,
            Predicate::NotEquals(v) => cell != v,
            Predicate::Contains(v) => cell.to_lowercase().contains(v.as_str()),
            Predicate::NotContains(v) => !cell.to_lowercase().contains(v.as_str()),
            Predicate::StartsWith(v) => cell.to_lowercase().starts_with(v.as_str()),
            Predicate::EndsWith(v) => cell.to_lowercase().ends_with(v.as_str()),
            Predicate::Pattern(re) => re.is_match(cell),
            Predicate::Numeric(cmp, bound) => parse_number(cell).map(|n| cmp.holds(n, *bound)).unwrap_or(false),
            Predicate::Member(list) => list.iter().any(|v| v == cell),
            Predicate::NotMember(list) => !list.iter().any(|v| v == cell),
            Predicate::After(t) => parse_timestamp(cell).map(|d| d > *t).unwrap_or(false),
            Predicate::Before(t) => parse_timestamp(cell).map(|d| d < *t).unwrap_or(false),
            Predicate::Between(start, end) => parse_timestamp(cell).map(|d| d >= *start && d <= *end).unwrap_or(false),
            Predicate::Never => false,
        }
    }
}

/// Request-scoped `(field, operator, value)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self { field: field.into(), op, value: value.into() }
    }

    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter { field: self.field.clone(), predicate: Predicate::compile(self.op, &self.value) }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFilter {
    field: String,
    predicate: Predicate,
}

impl CompiledFilter {
    /// A missing field evaluates as "".
    pub fn matches(&self, row: &Row) -> bool {
        self.predicate.matches(row.get(&self.field).map(String::as_str).unwrap_or(""))
    }
}

pub fn apply_field_filter(rows: Vec<Row>, spec: &FilterSpec) -> Vec<Row> {
    let compiled = spec.compile();
    rows.into_iter().filter(|r| compiled.matches(r)).collect()
}

/// Case-insensitive substring test against every cell of the row.
pub fn matches_search(row: &Row, needle_lower: &str) -> bool {
    row.values().any(|v| v.to_lowercase().contains(needle_lower))
}

pub fn apply_search(rows: Vec<Row>, needle: &str) -> Vec<Row> {
    let needle = needle.to_lowercase();
    rows.into_iter().filter(|r| matches_search(r, &needle)).collect()
}
