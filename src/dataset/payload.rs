//! Client-supplied row payloads.
//! A payload is a JSON object whose key order is kept, since new columns are
//! appended to a dataset header in the order a client first sends them.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::storage::ID_COLUMN;

/// Scalar JSON value accepted as a cell; stored as its text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Cell text: null → "", booleans as `true`/`false`, numbers in JSON form.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self { FieldValue::Number(n.into()) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Bool(b) }
}

/// Ordered field map. A repeated key keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPayload {
    fields: Vec<(String, FieldValue)>,
}

impl RowPayload {
    pub fn new() -> Self { Self::default() }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> { self.fields.iter().map(|(k, _)| k.as_str()) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> { self.fields.iter().map(|(k, v)| (k.as_str(), v)) }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    /// Client-supplied id, when present and non-empty.
    pub fn id_cell(&self) -> Option<String> {
        self.get(ID_COLUMN).map(FieldValue::to_cell).filter(|s| !s.is_empty())
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for RowPayload {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut p = RowPayload::new();
        for (k, v) in iter { p.insert(k, v); }
        p
    }
}

impl Serialize for RowPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields { map.serialize_entry(k, v)?; }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = RowPayload;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of scalar field values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RowPayload, A::Error> {
                let mut out = RowPayload::new();
                while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
                    out.insert(key, value);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(PayloadVisitor)
    }
}
