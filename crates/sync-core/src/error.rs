//! Error taxonomy shared by every stage of a transfer.
//!
//! Row-scoped problems ([`CoercionError`]) are collected into the
//! [`TransferResult`](crate::TransferResult). Everything else travels as a
//! [`TransferError`] and ends up, at most once per transfer, as the result's
//! `first_error`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Category of a failure, reported to callers with every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Request,
    Connection,
    Schema,
    Coercion,
    BatchWrite,
    Timeout,
    SourceRead,
}

/// Malformed or contradictory transfer request. Raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub message: String,
}

impl RequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Column name or type that cannot be represented in the destination.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Name is empty or contains characters the quoting convention cannot carry
    #[error("Name {name:?} cannot be represented as an identifier: {reason}")]
    UnrepresentableName { name: String, reason: String },

    /// Column not found in the schema it was resolved against
    #[error("Column '{column}' not found in {context}")]
    ColumnNotFound { column: String, context: String },

    /// Table does not exist in the destination
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Table creation with an empty column list
    #[error("No columns provided for table '{0}'")]
    NoColumns(String),
}

/// A single row that could not be transcoded. Row-scoped and non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("row {row_index}: {message}")]
pub struct CoercionError {
    /// Index of the originating source record
    pub row_index: u64,

    /// Offending column, when the failure is tied to one field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    pub message: String,
}

impl CoercionError {
    pub fn new(row_index: u64, message: impl Into<String>) -> Self {
        Self {
            row_index,
            column: None,
            message: message.into(),
        }
    }

    pub fn in_column(row_index: u64, column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row_index,
            column: Some(column.into()),
            message: message.into(),
        }
    }
}

/// Errors that can occur during a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    /// Destination unreachable or credentials rejected. Never retried.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Coercion failed at {0}")]
    Coercion(#[from] CoercionError),

    /// Destination rejected a whole batch
    #[error("Destination rejected batch: {0}")]
    BatchWrite(String),

    /// An I/O operation exceeded its deadline. Transient: the caller may retry
    /// the whole transfer.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The row source failed mid-read
    #[error("Failed to read source: {0}")]
    SourceRead(String),
}

impl TransferError {
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(_) => ErrorKind::Request,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Coercion(_) => ErrorKind::Coercion,
            Self::BatchWrite(_) => ErrorKind::BatchWrite,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::SourceRead(_) => ErrorKind::SourceRead,
        }
    }

    /// Whether retrying the whole transfer may succeed without changing input.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            kind: self.kind(),
            message: self.to_string(),
            batch_index: None,
            batch_rows: None,
        }
    }
}

/// Serializable summary of a [`TransferError`], as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,

    /// Zero-based index of the batch that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<usize>,

    /// Number of rows in the failed batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_rows: Option<usize>,
}

impl ErrorDescriptor {
    pub fn for_batch(mut self, batch_index: usize, batch_rows: usize) -> Self {
        self.batch_index = Some(batch_index);
        self.batch_rows = Some(batch_rows);
        self
    }
}
