//! Semantic column types.
//!
//! `InferredType` is deliberately coarse. Each store derives its native column
//! type from it through a [`ToDdl`] implementation in its own types crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic type of a column.
///
/// Produced by type inference over delimited text, or derived from the
/// column types a store reports for an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredType {
    /// Whole numbers that fit in 64 bits
    Integer,
    /// Any other finite base-10 number
    Float,
    /// true/false or 1/0
    Boolean,
    /// ISO-8601 date or date-time
    DateTime,
    /// Fallback for everything else
    Text,
}

impl InferredType {
    /// Every variant, in declaration order.
    pub const ALL: [InferredType; 5] = [
        InferredType::Integer,
        InferredType::Float,
        InferredType::Boolean,
        InferredType::DateTime,
        InferredType::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "date_time",
            Self::Text => "text",
        }
    }

    /// Whether values of this type are re-serialized in canonical numeric form.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InferredType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "integer" | "int" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date_time" | "datetime" => Ok(Self::DateTime),
            "text" | "string" => Ok(Self::Text),
            other => Err(format!(
                "unknown column type '{other}': expected integer, float, boolean, date_time or text"
            )),
        }
    }
}

/// Trait for generating DDL column types from [`InferredType`].
///
/// The mapping must be total: every semantic type has exactly one native type.
pub trait ToDdl {
    /// Native column type for `inferred_type`, wrapped for nullability if the
    /// store distinguishes nullable columns.
    fn to_ddl(&self, inferred_type: InferredType, nullable: bool) -> String;
}
