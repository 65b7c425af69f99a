//! Forward conversion: Row → JSONEachRow
//!
//! Each row becomes one JSON object keyed by column name, the body format of
//! `INSERT ... FORMAT JSONEachRow`. Values are shaped for the column type the
//! table was created with (see [`ClickHouseDdl`](crate::ClickHouseDdl)).

use serde_json::{Map, Number, Value as JsonValue};
use sync_core::{CoercionError, ColumnDescriptor, InferredType, Row, Value, DATETIME_FORMAT};

/// Convert one value for `column`.
pub fn value_to_json(
    value: &Value,
    column: &ColumnDescriptor,
    row_index: u64,
) -> Result<JsonValue, CoercionError> {
    let mismatch = || {
        CoercionError::in_column(
            row_index,
            &column.name,
            format!(
                "Cannot write {} value to {} column '{}'",
                value.type_name(),
                column.inferred_type,
                column.name
            ),
        )
    };

    let json = match (column.inferred_type, value) {
        (_, Value::Null) => JsonValue::Null,

        (InferredType::Integer, Value::Integer(i)) => JsonValue::from(*i),
        (InferredType::Integer, Value::Boolean(b)) => JsonValue::from(i64::from(*b)),

        (InferredType::Float, Value::Float(f)) => {
            JsonValue::Number(Number::from_f64(*f).ok_or_else(mismatch)?)
        }
        (InferredType::Float, Value::Integer(i)) => JsonValue::from(*i),

        // Bool columns, and UInt8 ones with bools read as numbers
        (InferredType::Boolean, Value::Boolean(b)) => JsonValue::Bool(*b),
        (InferredType::Boolean, Value::Integer(i @ (0 | 1))) => JsonValue::Bool(*i == 1),

        (InferredType::DateTime, Value::DateTime(dt)) => {
            JsonValue::String(dt.format(DATETIME_FORMAT).to_string())
        }
        // Passed through; the insert runs with best-effort date-time parsing
        (InferredType::DateTime, Value::Text(s)) => JsonValue::String(s.clone()),

        (InferredType::Text, Value::Text(s)) => JsonValue::String(s.clone()),
        (InferredType::Text, Value::Integer(i)) => JsonValue::String(i.to_string()),
        (InferredType::Text, Value::Float(f)) => JsonValue::String(f.to_string()),
        (InferredType::Text, Value::Boolean(b)) => JsonValue::String(b.to_string()),
        (InferredType::Text, Value::DateTime(dt)) => {
            JsonValue::String(dt.format(DATETIME_FORMAT).to_string())
        }
        (InferredType::Text, Value::Structured(json)) => JsonValue::String(json.to_string()),

        _ => return Err(mismatch()),
    };
    Ok(json)
}

/// Serialize a row as a single JSONEachRow line (without the newline).
///
/// Only `columns` are written. A column the row does not carry is an error.
pub fn row_to_json_line(row: &Row, columns: &[ColumnDescriptor]) -> Result<String, CoercionError> {
    let mut object = Map::with_capacity(columns.len());
    for column in columns {
        let value = row.get(&column.name).ok_or_else(|| {
            CoercionError::in_column(
                row.index(),
                &column.name,
                format!("Row has no value for column '{}'", column.name),
            )
        })?;
        object.insert(column.name.clone(), value_to_json(value, column, row.index())?);
    }
    serde_json::to_string(&JsonValue::Object(object))
        .map_err(|e| CoercionError::new(row.index(), format!("Failed to encode row: {e}")))
}
