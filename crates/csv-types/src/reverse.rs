//! Reverse conversion: delimited record → Row.
//!
//! Values are parsed according to the column's [`InferredType`]. The inferred
//! type comes from a sample, so any value may still fail here; a failure
//! rejects the whole row.

use crate::infer::{is_numeric_literal, parse_datetime};
use sync_core::{CoercionError, ColumnDescriptor, InferredType, RawRecord, Row, Value};

/// Parse one field token for `column`.
///
/// Empty tokens become [`Value::Null`]. For non-text columns surrounding
/// whitespace is ignored, so a blank token is null as well.
pub fn parse_field(
    token: &str,
    column: &ColumnDescriptor,
    row_index: u64,
) -> Result<Value, CoercionError> {
    if token.is_empty() {
        return Ok(Value::Null);
    }
    if column.inferred_type == InferredType::Text {
        return Ok(Value::Text(token.to_string()));
    }

    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    let invalid = |what: &str| {
        CoercionError::in_column(
            row_index,
            &column.name,
            format!("Invalid {what} '{token}' in column '{}'", column.name),
        )
    };

    match column.inferred_type {
        InferredType::Integer => {
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::Integer(i));
            }
            // "3.0" and "1e3" still denote whole numbers
            if is_numeric_literal(trimmed) {
                if let Some(i) = whole_number(trimmed) {
                    return Ok(Value::Integer(i));
                }
            }
            Err(invalid("integer"))
        }

        InferredType::Float => {
            if is_numeric_literal(trimmed) {
                trimmed
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| invalid("float"))
            } else {
                Err(invalid("float"))
            }
        }

        // Lenient: accepts more spellings than inference does
        InferredType::Boolean => match trimmed.to_lowercase().as_str() {
            "true" | "1" | "yes" | "t" | "y" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "f" | "n" => Ok(Value::Boolean(false)),
            _ => Err(invalid("boolean")),
        },

        InferredType::DateTime => parse_datetime(trimmed)
            .map(Value::DateTime)
            .ok_or_else(|| invalid("date-time")),

        InferredType::Text => Ok(Value::Text(token.to_string())),
    }
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Read a whole number written with a fraction or an exponent.
///
/// A zero fraction is dropped and the rest parsed exactly. Exponent forms go
/// through `f64` and are only taken within its exact integer range.
fn whole_number(literal: &str) -> Option<i64> {
    if let Some((whole, fraction)) = literal.split_once('.') {
        if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') {
            if let Ok(i) = whole.parse::<i64>() {
                return Some(i);
            }
        }
    }
    let f = literal.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INTEGER).then_some(f as i64)
}

/// Convert a record whose fields line up with `columns` into a [`Row`].
///
/// All fields succeed or the row is rejected as a unit, tagged with the
/// record index.
pub fn to_row(record: &RawRecord, columns: &[ColumnDescriptor]) -> Result<Row, CoercionError> {
    if record.len() != columns.len() {
        return Err(CoercionError::new(
            record.index,
            format!(
                "Expected {} fields ({}), found {}",
                columns.len(),
                columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                record.len()
            ),
        ));
    }

    let mut row = Row::with_capacity(record.index, columns.len());
    for (token, column) in record.fields.iter().zip(columns) {
        let value = parse_field(token, column, record.index)?;
        row.insert(column.name.clone(), value);
    }
    Ok(row)
}

/// Pick the fields at `positions` out of a full-width record.
///
/// `width` is the header width of the file. Records of any other width are
/// rejected instead of being silently padded or truncated.
pub fn project_record(
    record: RawRecord,
    positions: &[usize],
    width: usize,
) -> Result<RawRecord, CoercionError> {
    if record.len() != width {
        return Err(CoercionError::new(
            record.index,
            format!(
                "Column count mismatch: expected {width} fields, found {}",
                record.len()
            ),
        ));
    }
    let RawRecord { index, mut fields } = record;
    let projected = positions
        .iter()
        .map(|&position| std::mem::take(&mut fields[position]))
        .collect();
    Ok(RawRecord::new(index, projected))
}
