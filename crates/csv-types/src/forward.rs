//! Forward conversion: Row → delimited record.
//!
//! Null becomes the empty string. Numbers, booleans and date-times are
//! written in one canonical form so a re-import infers the same types.

use sync_core::{CoercionError, ColumnDescriptor, RawRecord, Row, Value, DATETIME_FORMAT};

/// Shortest text that parses back to the same `f64`.
pub fn canonical_float(value: f64) -> String {
    // Display never uses exponent notation and drops a trailing ".0"
    value.to_string()
}

/// Render a single value as a field token.
pub fn value_to_field(value: &Value, row_index: u64, column: &str) -> Result<String, CoercionError> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => canonical_float(*f),
        Value::Float(f) => {
            return Err(CoercionError::in_column(
                row_index,
                column,
                format!("Non-finite float {f} in column '{column}'"),
            ))
        }
        Value::Boolean(b) => (if *b { "true" } else { "false" }).to_string(),
        Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        Value::Structured(json) => serde_json::to_string(json).map_err(|e| {
            CoercionError::in_column(row_index, column, format!("Failed to serialize value: {e}"))
        })?,
    })
}

/// Convert a [`Row`] into a record whose fields follow `columns`.
///
/// Every column must be present in the row; extra row fields are ignored.
pub fn from_row(row: &Row, columns: &[ColumnDescriptor]) -> Result<RawRecord, CoercionError> {
    let fields = columns
        .iter()
        .map(|column| {
            let value = row.get(&column.name).ok_or_else(|| {
                CoercionError::in_column(
                    row.index(),
                    &column.name,
                    format!("Row has no value for column '{}'", column.name),
                )
            })?;
            value_to_field(value, row.index(), &column.name)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawRecord::new(row.index(), fields))
}
