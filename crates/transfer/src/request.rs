//! Transfer requests and their validation into executable plans.
//!
//! A [`TransferRequest`] is what a caller asks for. [`plan_transfer`] checks
//! it once, before any I/O, and produces a [`TransferPlan`] whose shape rules
//! out contradictory combinations (file to file, raw query into a table, ...).

use crate::engine::{FailureMode, TransferOptions, DEFAULT_BATCH_SIZE, DEFAULT_IO_TIMEOUT};
use csv_types::Delimiter;
use flatfile_sync_file::FileSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use sync_core::{ColumnSelection, RequestError};

/// Statements a raw query may start with.
pub const READ_ONLY_KEYWORDS: [&str; 6] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "EXPLAIN"];

/// A delimited file location and its delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// Local path or HTTP(S) URL
    pub location: String,
    #[serde(default)]
    pub delimiter: Delimiter,
}

impl FileSpec {
    pub fn new(location: impl Into<String>, delimiter: Delimiter) -> Self {
        Self {
            location: location.into(),
            delimiter,
        }
    }
}

/// Where rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDescriptor {
    File(FileSpec),
    /// Exactly one of `table` and `query` must be set
    Store {
        #[serde(default)]
        table: Option<String>,
        #[serde(default)]
        query: Option<String>,
    },
}

/// Where rows go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationDescriptor {
    File(FileSpec),
    Store { table: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub source: SourceDescriptor,
    pub destination: DestinationDescriptor,
    pub selected_columns: ColumnSelection,
    pub batch_size: usize,
    /// Create the destination table from an inferred schema when absent
    pub create_destination_if_absent: bool,
    pub failure_mode: FailureMode,
    pub io_timeout: Duration,
}

impl TransferRequest {
    pub fn new(source: SourceDescriptor, destination: DestinationDescriptor) -> Self {
        Self {
            source,
            destination,
            selected_columns: ColumnSelection::All,
            batch_size: DEFAULT_BATCH_SIZE,
            create_destination_if_absent: false,
            failure_mode: FailureMode::FailFast,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// What an export reads from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportQuery {
    /// Selected columns of one table
    Table {
        table: String,
        selection: ColumnSelection,
    },
    /// A read-only query passed through as-is. Its result header defines the
    /// columns, so `ignored_selection` only serves to warn the caller.
    Raw {
        sql: String,
        ignored_selection: ColumnSelection,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferDirection {
    /// Delimited file into a store table
    Import {
        source: FileSource,
        delimiter: Delimiter,
        table: String,
        selection: ColumnSelection,
        create_table: bool,
    },
    /// Store query into a local delimited file
    Export {
        query: ExportQuery,
        output: PathBuf,
        delimiter: Delimiter,
    },
}

/// A validated transfer, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub direction: TransferDirection,
    pub options: TransferOptions,
}

fn non_empty(name: &str, what: &str) -> Result<String, RequestError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RequestError::new(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn parse_location(spec: &FileSpec) -> Result<FileSource, RequestError> {
    FileSource::parse(&spec.location).map_err(|e| RequestError::new(e.to_string()))
}

/// Reject anything but a single read-only statement.
pub fn check_read_only(sql: &str) -> Result<(), RequestError> {
    let statement = sql.trim().trim_end_matches(';').trim_end();
    if statement.is_empty() {
        return Err(RequestError::new("Query must not be empty"));
    }
    // Naive: a ';' inside a string literal is rejected too
    if statement.contains(';') {
        return Err(RequestError::new("Query must be a single statement"));
    }
    let keyword: String = statement
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if READ_ONLY_KEYWORDS.contains(&keyword.as_str()) {
        Ok(())
    } else {
        Err(RequestError::new(format!(
            "Only read-only queries are allowed ({}), got '{keyword}'",
            READ_ONLY_KEYWORDS.join(", ")
        )))
    }
}

/// Validate `request` and turn it into a plan. Performs no I/O.
pub fn plan_transfer(request: TransferRequest) -> Result<TransferPlan, RequestError> {
    if request.batch_size == 0 {
        return Err(RequestError::new("Batch size must be greater than zero"));
    }
    if request.io_timeout.is_zero() {
        return Err(RequestError::new("Timeout must be greater than zero"));
    }
    request.selected_columns.validate()?;

    let direction = match (request.source, request.destination) {
        (SourceDescriptor::File(spec), DestinationDescriptor::Store { table }) => {
            TransferDirection::Import {
                source: parse_location(&spec)?,
                delimiter: spec.delimiter,
                table: non_empty(&table, "Destination table")?,
                selection: request.selected_columns,
                create_table: request.create_destination_if_absent,
            }
        }
        (SourceDescriptor::Store { table, query }, DestinationDescriptor::File(spec)) => {
            if request.create_destination_if_absent {
                return Err(RequestError::new(
                    "Creating the destination is only possible for a table destination",
                ));
            }
            let query = match (table, query) {
                (Some(table), None) => ExportQuery::Table {
                    table: non_empty(&table, "Source table")?,
                    selection: request.selected_columns,
                },
                (None, Some(sql)) => {
                    check_read_only(&sql)?;
                    ExportQuery::Raw {
                        sql: sql.trim().to_string(),
                        ignored_selection: request.selected_columns,
                    }
                }
                (Some(_), Some(_)) => {
                    return Err(RequestError::new(
                        "Specify either a source table or a query, not both",
                    ))
                }
                (None, None) => {
                    return Err(RequestError::new("Specify a source table or a query"))
                }
            };
            let output = match parse_location(&spec)? {
                FileSource::Local(path) => path,
                FileSource::Http(url) => {
                    return Err(RequestError::new(format!(
                        "Cannot write to '{url}': HTTP locations are read-only"
                    )))
                }
            };
            TransferDirection::Export {
                query,
                output,
                delimiter: spec.delimiter,
            }
        }
        (SourceDescriptor::File(_), DestinationDescriptor::File(_)) => {
            return Err(RequestError::new(
                "File to file transfers are not supported; one side must be the store",
            ))
        }
        (SourceDescriptor::Store { .. }, DestinationDescriptor::Store { .. }) => {
            return Err(RequestError::new(
                "Table to table transfers are not supported; one side must be a file",
            ))
        }
    };

    Ok(TransferPlan {
        direction,
        options: TransferOptions {
            batch_size: request.batch_size,
            failure_mode: request.failure_mode,
            io_timeout: request.io_timeout,
        },
    })
}
