//! Streaming reader for `JSONCompactEachRowWithNamesAndTypes` results.
//!
//! The first line holds the column names and the second the column types.
//! Every following line is one row as a JSON array. Lines are parsed as they
//! arrive, so memory use does not grow with the result size.

use clickhouse_types::{clickhouse_type_to_inferred, row_from_compact};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value as JsonValue;
use sync_core::{CoercionError, ColumnDescriptor, Row, TransferError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One result row, values aligned with the stream's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactRow {
    /// Zero-based position in the result
    pub index: u64,
    pub values: Vec<JsonValue>,
}

impl CompactRow {
    pub fn new(index: u64, values: Vec<JsonValue>) -> Self {
        Self { index, values }
    }

    /// Convert to a [`Row`] using the column types of the result.
    pub fn into_row(self, columns: &[ColumnDescriptor]) -> Result<Row, CoercionError> {
        row_from_compact(self.values, columns, self.index)
    }
}

/// Rows of a store query, preceded by the result columns.
pub struct StoreRowStream {
    columns: Vec<ColumnDescriptor>,
    rows: BoxStream<'static, Result<CompactRow, TransferError>>,
}

impl StoreRowStream {
    pub fn new(
        columns: Vec<ColumnDescriptor>,
        rows: BoxStream<'static, Result<CompactRow, TransferError>>,
    ) -> Self {
        // Pulling again after the end must keep returning nothing
        Self {
            columns,
            rows: rows.fuse().boxed(),
        }
    }

    /// Stream over rows that are already in memory.
    pub fn from_rows(columns: Vec<ColumnDescriptor>, rows: Vec<CompactRow>) -> Self {
        Self::new(columns, stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    /// Result columns, as announced by the store.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub async fn next_row(&mut self) -> Option<Result<CompactRow, TransferError>> {
        self.rows.next().await
    }

    /// Pull up to `max` rows. An empty batch means the stream is exhausted.
    pub async fn read_batch(&mut self, max: usize) -> Result<Vec<CompactRow>, TransferError> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.next_row().await {
                Some(row) => batch.push(row?),
                None => break,
            }
        }
        Ok(batch)
    }
}

fn malformed(what: &str, line: &str) -> TransferError {
    const MAX_SHOWN: usize = 200;
    let shown: String = line.chars().take(MAX_SHOWN).collect();
    TransferError::SourceRead(format!("Unexpected {what} in query result: {shown}"))
}

fn parse_row(index: u64, line: &str) -> Result<CompactRow, TransferError> {
    // ClickHouse reports errors raised mid-stream as plain text lines
    serde_json::from_str::<Vec<JsonValue>>(line)
        .map(|values| CompactRow::new(index, values))
        .map_err(|_| malformed("row", line))
}

async fn next_non_empty_line<R>(
    lines: &mut tokio::io::Lines<R>,
) -> Result<Option<String>, TransferError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(line) => return Ok(line),
            Err(e) => {
                return Err(TransferError::SourceRead(format!(
                    "Failed to read query result: {e}"
                )))
            }
        }
    }
}

/// Read the two header lines, then stream the remaining lines as rows.
///
/// An empty body yields no columns and no rows. `limit` stops the stream
/// after that many rows.
pub(crate) async fn read_compact_rows<R>(
    reader: R,
    limit: Option<u64>,
) -> Result<StoreRowStream, TransferError>
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let mut lines = reader.lines();

    let Some(names_line) = next_non_empty_line(&mut lines).await? else {
        return Ok(StoreRowStream::from_rows(Vec::new(), Vec::new()));
    };
    let names: Vec<String> =
        serde_json::from_str(&names_line).map_err(|_| malformed("header", &names_line))?;
    let types_line = next_non_empty_line(&mut lines)
        .await?
        .ok_or_else(|| TransferError::SourceRead("Query result has no type header".into()))?;
    let types: Vec<String> =
        serde_json::from_str(&types_line).map_err(|_| malformed("type header", &types_line))?;

    if names.len() != types.len() {
        return Err(TransferError::SourceRead(format!(
            "Query result announces {} names but {} types",
            names.len(),
            types.len()
        )));
    }

    let columns = names
        .into_iter()
        .zip(&types)
        .map(|(name, column_type)| {
            let (inferred_type, nullable) = clickhouse_type_to_inferred(column_type);
            ColumnDescriptor {
                name,
                inferred_type,
                nullable,
            }
        })
        .collect();

    let rows = stream::unfold((lines, 0u64), |(mut lines, index)| async move {
        match next_non_empty_line(&mut lines).await {
            Ok(Some(line)) => Some((parse_row(index, &line), (lines, index + 1))),
            Ok(None) => None,
            Err(e) => Some((Err(e), (lines, index + 1))),
        }
    });

    let rows = match limit {
        Some(limit) => rows.take(limit as usize).boxed(),
        None => rows.boxed(),
    };
    Ok(StoreRowStream::new(columns, rows))
}
