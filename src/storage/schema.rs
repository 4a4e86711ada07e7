//! Header unification for heterogeneous rows.

use std::collections::HashSet;

use super::Row;

/// Ordered, duplicate-free union: existing columns keep their order, unseen
/// incoming columns are appended in first-appearance order.
pub fn unify_headers<I, S>(existing: &[String], incoming: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::with_capacity(existing.len());
    let mut out: Vec<String> = Vec::with_capacity(existing.len());
    for col in existing {
        if seen.insert(col.to_string()) { out.push(col.to_string()); }
    }
    for col in incoming {
        let col = col.as_ref();
        if seen.insert(col.to_string()) { out.push(col.to_string()); }
    }
    out
}

/// Make every row carry exactly the header's keys: absent columns become "",
/// keys outside the header are dropped.
pub fn normalize_rows(rows: &mut [Row], header: &[String]) {
    for row in rows.iter_mut() {
        row.retain(|k, _| header.iter().any(|h| h == k));
        for col in header {
            row.entry(col.clone()).or_default();
        }
    }
}
