//! Core types for the clickhouse-flatfile-sync framework.
//!
//! This crate provides the foundational types used across the transfer
//! pipeline, including:
//!
//! - [`InferredType`] - Semantic column types detected from text or read from the store
//! - [`ColumnDescriptor`] / [`SchemaSnapshot`] - Column metadata and schema previews
//! - [`Row`] / [`Value`] - The structured row form every transfer passes through
//! - [`RawRecord`] - One untyped record of a delimited file
//! - [`TransferResult`] - The outcome of a single transfer
//! - [`TransferError`] - The error taxonomy shared by every stage
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── csv-types          (type inference, delimited text <-> Row)
//!    ├─── clickhouse-types   (DDL mapping, ClickHouse JSON <-> Row)
//!    ├─── clickhouse-sink    (store adapter)
//!    └─── transfer           (batch engine, resolver, planning)
//! ```

pub mod error;
pub mod result;
pub mod schema;
pub mod types;
pub mod values;

pub use error::{
    CoercionError, ErrorDescriptor, ErrorKind, RequestError, SchemaError, TransferError,
};
pub use result::{TransferResult, MAX_RECORDED_REJECTIONS};
pub use schema::{
    map_to_source_projection, ColumnDescriptor, ColumnSelection, SchemaSnapshot,
    SAMPLE_PREVIEW_ROWS,
};
pub use types::{InferredType, ToDdl};
pub use values::{RawRecord, Row, Value, DATETIME_FORMAT};
