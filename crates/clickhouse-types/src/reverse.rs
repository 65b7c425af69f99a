//! Reverse conversion: ClickHouse JSON values → Value
//!
//! Query results arrive as `JSONCompactEachRowWithNamesAndTypes`: one JSON
//! array per row, values positionally aligned with the announced columns.
//! ClickHouse quotes 64-bit integers by default, so numeric columns accept
//! both JSON numbers and numeric strings. Decimals are read as quoted text.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use sync_core::{CoercionError, ColumnDescriptor, InferredType, Row, Value};

const CLICKHOUSE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_clickhouse_datetime(s: &str) -> Option<NaiveDateTime> {
    for format in CLICKHOUSE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Convert one JSON value read from ClickHouse for `column`.
///
/// Values outside the range of the sync-core representation (UInt64 above
/// `i64::MAX`, `nan`, date-times with a non-default output format) are kept
/// as text so they survive a file export unchanged.
pub fn json_to_value(
    json: JsonValue,
    column: &ColumnDescriptor,
    row_index: u64,
) -> Result<Value, CoercionError> {
    let value = match (column.inferred_type, json) {
        (_, JsonValue::Null) => Value::Null,

        (InferredType::Integer, JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Text(n.to_string()),
        },
        (InferredType::Integer, JsonValue::String(s)) => match s.parse::<i64>() {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(s),
        },
        (InferredType::Integer, JsonValue::Bool(b)) => Value::Integer(i64::from(b)),

        (InferredType::Float, JsonValue::Number(n)) => match n.as_f64() {
            Some(f) => Value::Float(f),
            None => Value::Text(n.to_string()),
        },
        (InferredType::Float, JsonValue::String(s)) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(s),
        },

        (InferredType::Boolean, JsonValue::Bool(b)) => Value::Boolean(b),
        (InferredType::Boolean, JsonValue::Number(n)) => match n.as_i64() {
            Some(0) => Value::Boolean(false),
            Some(1) => Value::Boolean(true),
            _ => Value::Text(n.to_string()),
        },

        (InferredType::DateTime, JsonValue::String(s)) => match parse_clickhouse_datetime(&s) {
            Some(dt) => Value::DateTime(dt),
            None => Value::Text(s),
        },
        // DateTime with date_time_output_format=unix_timestamp
        (InferredType::DateTime, JsonValue::Number(n)) => Value::Text(n.to_string()),

        (InferredType::Text, JsonValue::String(s)) => Value::Text(s),
        (InferredType::Text, JsonValue::Number(n)) => Value::Text(n.to_string()),
        (InferredType::Text, JsonValue::Bool(b)) => Value::Text(b.to_string()),
        (_, json @ (JsonValue::Array(_) | JsonValue::Object(_))) => Value::Structured(json),

        (_, other) => {
            return Err(CoercionError::in_column(
                row_index,
                &column.name,
                format!(
                    "Unexpected JSON value {other} for {} column '{}'",
                    column.inferred_type, column.name
                ),
            ))
        }
    };
    Ok(value)
}

/// Build a [`Row`] from one compact JSON row.
///
/// The row must carry exactly one value per column.
pub fn row_from_compact(
    values: Vec<JsonValue>,
    columns: &[ColumnDescriptor],
    row_index: u64,
) -> Result<Row, CoercionError> {
    if values.len() != columns.len() {
        return Err(CoercionError::new(
            row_index,
            format!(
                "Expected {} values, found {}",
                columns.len(),
                values.len()
            ),
        ));
    }
    let mut row = Row::with_capacity(row_index, columns.len());
    for (json, column) in values.into_iter().zip(columns) {
        row.insert(column.name.clone(), json_to_value(json, column, row_index)?);
    }
    Ok(row)
}
