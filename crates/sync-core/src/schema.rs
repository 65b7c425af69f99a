//! Schema definitions: column metadata, schema previews and column selection.

use crate::error::{RequestError, SchemaError};
use crate::types::InferredType;
use crate::values::RawRecord;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::str::FromStr;

/// Maximum number of raw rows a [`SchemaSnapshot`] keeps for preview.
pub const SAMPLE_PREVIEW_ROWS: usize = 10;

/// Column definition shared by inference, schema fetches and transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Semantic column type
    #[serde(rename = "type")]
    pub inferred_type: InferredType,

    /// Whether this column may hold nulls
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Create a new non-nullable column descriptor.
    pub fn new(name: impl Into<String>, inferred_type: InferredType) -> Self {
        Self {
            name: name.into(),
            inferred_type,
            nullable: false,
        }
    }

    /// Create a new nullable column descriptor.
    pub fn nullable(name: impl Into<String>, inferred_type: InferredType) -> Self {
        Self {
            name: name.into(),
            inferred_type,
            nullable: true,
        }
    }
}

/// Detected columns plus a few raw rows, for display and table-creation
/// decisions. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub columns: Vec<ColumnDescriptor>,

    /// At most [`SAMPLE_PREVIEW_ROWS`] records, in source order
    pub sample_rows: Vec<RawRecord>,
}

impl SchemaSnapshot {
    /// Create a snapshot, keeping only the first [`SAMPLE_PREVIEW_ROWS`] rows.
    pub fn new(columns: Vec<ColumnDescriptor>, sample: &[RawRecord]) -> Self {
        Self {
            columns,
            sample_rows: sample.iter().take(SAMPLE_PREVIEW_ROWS).cloned().collect(),
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Which columns a transfer reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    /// Every column of the resolved source schema, in schema order
    #[default]
    All,

    /// An explicit ordered set of column names
    Named(Vec<String>),
}

impl ColumnSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether an explicit, non-empty list of columns was given.
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Named(names) if !names.is_empty())
    }

    /// Reject empty lists, blank names and duplicates.
    pub fn validate(&self) -> Result<(), RequestError> {
        let Self::Named(names) = self else {
            return Ok(());
        };
        if names.is_empty() {
            return Err(RequestError::new(
                "Column selection is empty; use 'all' to select every column",
            ));
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(RequestError::new("Column selection contains a blank name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(RequestError::new(format!(
                    "Column '{name}' is selected more than once"
                )));
            }
        }
        Ok(())
    }
}

impl FromStr for ColumnSelection {
    type Err = RequestError;

    /// `all` or `*` selects every column, anything else is a comma-separated list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
            return Ok(Self::All);
        }
        let names: Vec<String> = trimmed.split(',').map(|n| n.trim().to_string()).collect();
        let selection = Self::Named(names);
        selection.validate()?;
        Ok(selection)
    }
}

impl Serialize for ColumnSelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Named(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Keyword(String),
            List(Vec<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Keyword(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::List(names) => Ok(Self::Named(names)),
        }
    }
}

/// Resolve a selection against the columns a source actually has.
///
/// `All` expands here, once, so the write projection is fixed before the
/// first batch. `context` names the source in error messages.
pub fn map_to_source_projection(
    selection: &ColumnSelection,
    available: &[ColumnDescriptor],
    context: &str,
) -> Result<Vec<ColumnDescriptor>, SchemaError> {
    match selection {
        ColumnSelection::All => Ok(available.to_vec()),
        ColumnSelection::Named(names) => names
            .iter()
            .map(|name| {
                available
                    .iter()
                    .find(|c| &c.name == name)
                    .cloned()
                    .ok_or_else(|| SchemaError::ColumnNotFound {
                        column: name.clone(),
                        context: context.to_string(),
                    })
            })
            .collect(),
    }
}
