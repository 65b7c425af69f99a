//! Delimited-text type handling for sync-core rows.
//!
//! This crate provides schema detection over untyped delimited records and
//! bidirectional conversions between [`RawRecord`](sync_core::RawRecord) and
//! [`Row`](sync_core::Row).
//!
//! # Modules
//!
//! - [`infer`] - Column type inference from a sample of records
//! - [`reverse`] - Delimited record → Row conversion (`to_row`)
//! - [`forward`] - Row → delimited record conversion (`from_row`)
//! - [`delimiter`] - The configurable field delimiter
//!
//! # Example
//!
//! ```ignore
//! use csv_types::{infer_columns, to_row, from_row};
//!
//! let columns = infer_columns(&headers, &sample);
//! let row = to_row(&record, &columns)?;
//! let back = from_row(&row, &columns)?;
//! ```

pub mod delimiter;
pub mod forward;
pub mod infer;
pub mod reverse;

pub use delimiter::Delimiter;
pub use forward::{canonical_float, from_row, value_to_field};
pub use infer::{
    infer_column, infer_columns, infer_schema, is_boolean_literal, is_numeric_literal,
    parse_datetime, Candidate, DEFAULT_SAMPLE_ROWS, INFERENCE_PRIORITY,
};
pub use reverse::{parse_field, project_record, to_row};
