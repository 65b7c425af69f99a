//! ClickHouse column types to InferredType.
//!
//! Used when the schema of an existing table is fetched with `DESCRIBE TABLE`
//! or when a query result announces its column types.

use sync_core::InferredType;

/// Strip a single `Wrapper(...)` around `column_type`, if present.
fn unwrap_type<'a>(column_type: &'a str, wrapper: &str) -> Option<&'a str> {
    column_type
        .strip_prefix(wrapper)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
}

/// Convert a ClickHouse column type to an `InferredType` plus nullability.
///
/// `Nullable(T)` marks the column nullable and `LowCardinality(T)` is
/// transparent. Types with no closer counterpart, including composite
/// types, map to `Text`. Decimals are `Text` too: their digits do not fit
/// an `f64`.
pub fn clickhouse_type_to_inferred(column_type: &str) -> (InferredType, bool) {
    let mut inner = column_type.trim();
    let mut nullable = false;
    loop {
        if let Some(t) = unwrap_type(inner, "Nullable") {
            nullable = true;
            inner = t;
        } else if let Some(t) = unwrap_type(inner, "LowCardinality") {
            inner = t;
        } else {
            break;
        }
    }

    // Parameterized types such as DateTime64(3) or Decimal(18, 4)
    let name = inner.split('(').next().unwrap_or(inner).trim();

    let inferred_type = match name {
        "Int8" | "Int16" | "Int32" | "Int64" | "Int128" | "Int256" | "UInt8" | "UInt16"
        | "UInt32" | "UInt64" | "UInt128" | "UInt256" => InferredType::Integer,
        "Float32" | "Float64" => InferredType::Float,
        "Bool" | "Boolean" => InferredType::Boolean,
        "Date" | "Date32" | "DateTime" | "DateTime64" => InferredType::DateTime,
        _ => InferredType::Text,
    };
    (inferred_type, nullable)
}
