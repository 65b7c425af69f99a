//! Column type inference over a sample of delimited records.
//!
//! Each column keeps one flag per [`Candidate`]. A flag starts true and is
//! cleared by the first value that disqualifies it; empty values are skipped.
//! The surviving candidate that comes first in [`INFERENCE_PRIORITY`] decides
//! the column type, and `Text` is the fallback.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sync_core::{ColumnDescriptor, InferredType, RawRecord, SchemaSnapshot};

/// Default number of records sampled for inference.
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Candidate types tracked per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Finite base-10 floating-point literal. Resolves to `Integer` when every
    /// value is also a 64-bit integer, `Float` otherwise.
    Numeric,
    /// One of `true`, `false`, `0`, `1` (case-insensitive)
    Boolean,
    /// ISO-8601 date or date-time
    DateTime,
}

/// Resolution order. Numeric wins over Boolean, so a column holding only
/// `0` and `1` is an `Integer` column.
pub const INFERENCE_PRIORITY: [Candidate; 3] =
    [Candidate::Numeric, Candidate::Boolean, Candidate::DateTime];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Whether `value` is a finite base-10 floating-point literal.
pub fn is_numeric_literal(value: &str) -> bool {
    let trimmed = value.trim();
    // f64::from_str also accepts "inf" and "NaN", which are not literals here
    let starts_like_number = trimmed
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
    starts_like_number && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Whether `value` is one of the boolean literals inference accepts.
pub fn is_boolean_literal(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "false" | "0" | "1"
    )
}

/// Parse an ISO-8601 date or date-time.
///
/// Values with an offset are converted to UTC. Date-only values map to
/// midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ndt);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[derive(Debug, Clone, Copy)]
struct CandidateFlags {
    numeric: bool,
    integer: bool,
    boolean: bool,
    datetime: bool,
    seen_value: bool,
    seen_empty: bool,
}

impl CandidateFlags {
    fn new() -> Self {
        Self {
            numeric: true,
            integer: true,
            boolean: true,
            datetime: true,
            seen_value: false,
            seen_empty: false,
        }
    }

    fn observe(&mut self, value: Option<&str>) {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.seen_empty = true;
                return;
            }
        };
        self.seen_value = true;

        if self.numeric && !is_numeric_literal(value) {
            self.numeric = false;
        }
        if self.integer && value.trim().parse::<i64>().is_err() {
            self.integer = false;
        }
        if self.boolean && !is_boolean_literal(value) {
            self.boolean = false;
        }
        if self.datetime && parse_datetime(value).is_none() {
            self.datetime = false;
        }
    }

    fn survives(&self, candidate: Candidate) -> bool {
        match candidate {
            Candidate::Numeric => self.numeric,
            Candidate::Boolean => self.boolean,
            Candidate::DateTime => self.datetime,
        }
    }

    fn resolve(&self) -> InferredType {
        if !self.seen_value {
            return InferredType::Text;
        }
        let winner = INFERENCE_PRIORITY.iter().find(|c| self.survives(**c));
        match winner {
            Some(Candidate::Numeric) if self.integer => InferredType::Integer,
            Some(Candidate::Numeric) => InferredType::Float,
            Some(Candidate::Boolean) => InferredType::Boolean,
            Some(Candidate::DateTime) => InferredType::DateTime,
            None => InferredType::Text,
        }
    }
}

/// Infer the type and nullability of one column from its sampled values.
///
/// `None` stands for a missing field and counts as empty.
pub fn infer_column<'a, I>(values: I) -> (InferredType, bool)
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut flags = CandidateFlags::new();
    for value in values {
        flags.observe(value);
    }
    (flags.resolve(), flags.seen_empty)
}

/// Infer one [`ColumnDescriptor`] per header, in header order.
pub fn infer_columns(headers: &[String], sample: &[RawRecord]) -> Vec<ColumnDescriptor> {
    headers
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let (inferred_type, nullable) =
                infer_column(sample.iter().map(|record| record.get(position)));
            ColumnDescriptor {
                name: name.clone(),
                inferred_type,
                nullable,
            }
        })
        .collect()
}

/// Infer the columns and keep a short preview of the sample.
pub fn infer_schema(headers: &[String], sample: &[RawRecord]) -> SchemaSnapshot {
    SchemaSnapshot::new(infer_columns(headers, sample), sample)
}
