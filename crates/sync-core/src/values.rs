//! Value representations for the transfer pipeline.
//!
//! A [`Row`] is the common structured form every transfer passes through,
//! regardless of direction. A [`RawRecord`] is one untyped delimited record.

use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Canonical text form of date-time values, accepted by ClickHouse `DateTime`
/// columns without any input-format settings.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single scalar value in a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value. Empty strings normalize to this.
    Null,

    /// Free-form text
    Text(String),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit float
    Float(f64),

    /// Boolean
    Boolean(bool),

    /// Date-time without timezone (UTC by convention)
    DateTime(NaiveDateTime),

    /// Nested object or array as read from the store, kept opaque until it
    /// is serialized to text for a text column
    Structured(serde_json::Value),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::DateTime(_) => "date_time",
            Self::Structured(_) => "structured",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::DateTime(dt) => {
                serializer.serialize_str(&dt.format(DATETIME_FORMAT).to_string())
            }
            Self::Structured(v) => v.serialize(serializer),
        }
    }
}

/// Ordered mapping from column name to [`Value`].
///
/// Keys are unique and keep insertion order, which is the column order of
/// the transfer. `index` is the position of the originating source record.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    index: u64,
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            fields: Vec::new(),
        }
    }

    pub fn with_capacity(index: u64, capacity: usize) -> Self {
        Self {
            index,
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Build a row from `(name, value)` pairs. Later duplicates overwrite
    /// earlier ones in place.
    pub fn from_pairs<I, K>(index: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut row = Row::new(index);
        for (name, value) in pairs {
            row.insert(name, value);
        }
        row
    }

    /// Source record index this row was built from.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Insert a field. If the column already exists its value is replaced
    /// without changing its position, and the old value is returned.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        if let Some((_, existing)) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(existing, value));
        }
        self.fields.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One record of a delimited file, before any typing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Zero-based data record index (the header row is not counted)
    pub index: u64,

    /// Field tokens in column order
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(index: u64, fields: Vec<String>) -> Self {
        Self { index, fields }
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
