//! `StoreAdapter` over the ClickHouse HTTP interface.

use crate::stream::read_compact_rows;
use crate::{ClickHouseOpts, StoreAdapter, StoreQuery, StoreRowStream};
use clickhouse_types::{
    clickhouse_type_to_inferred, create_table_statement, insert_statement, qualified_table_name,
    quote_identifier, row_to_json_line, select_statement, DestinationColumnDef,
};
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use sync_core::{ColumnDescriptor, Row, SchemaError, TransferError};
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tracing::debug;

const COMPACT_FORMAT: &str = "JSONCompactEachRowWithNamesAndTypes";

/// What a request was for; decides how failures are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Ping,
    Metadata,
    Read,
    Insert,
    CreateTable,
}

impl Operation {
    fn describe(self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::Metadata => "metadata query",
            Operation::Read => "query",
            Operation::Insert => "insert",
            Operation::CreateTable => "create table",
        }
    }
}

#[derive(Deserialize)]
struct DescribeRow {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

#[derive(Deserialize)]
struct ShowTablesRow {
    name: String,
}

/// ClickHouse store over HTTP.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: reqwest::Client,
    opts: Arc<ClickHouseOpts>,
}

impl ClickHouseStore {
    pub fn new(opts: ClickHouseOpts) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .connect_timeout(opts.connect_timeout)
            .build()
            .map_err(|e| TransferError::Connection(format!("Failed to build HTTP client: {e}")))?;

        debug!(
            "ClickHouse store at {} (database: {}, user: {})",
            opts.endpoint, opts.database, opts.user
        );

        Ok(Self {
            client,
            opts: Arc::new(opts),
        })
    }

    pub fn database(&self) -> &str {
        &self.opts.database
    }

    fn request(&self, params: &[(&str, &str)]) -> reqwest::RequestBuilder {
        self.client
            .post(self.opts.base_url())
            .query(&[("database", self.opts.database.as_str())])
            .query(params)
            .header("X-ClickHouse-User", &self.opts.user)
            .header("X-ClickHouse-Key", &self.opts.password)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: Operation,
        table: Option<&str>,
    ) -> Result<reqwest::Response, TransferError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.request_error(e, operation))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.status_error(status, body.trim(), operation, table))
    }

    /// Run `sql` and return the whole response body.
    async fn execute(
        &self,
        sql: String,
        operation: Operation,
        table: Option<&str>,
    ) -> Result<String, TransferError> {
        debug!("ClickHouse {}: {}", operation.describe(), sql);
        let response = self.send(self.request(&[]).body(sql), operation, table).await?;
        response.text().await.map_err(|e| {
            TransferError::SourceRead(format!(
                "Failed to read {} response: {e}",
                operation.describe()
            ))
        })
    }

    fn request_error(&self, error: reqwest::Error, operation: Operation) -> TransferError {
        if error.is_connect() {
            return TransferError::Connection(format!(
                "Cannot reach ClickHouse at {}: {error}",
                self.opts.endpoint
            ));
        }
        if error.is_timeout() {
            return TransferError::timeout(operation.describe(), self.opts.connect_timeout);
        }
        match operation {
            Operation::Insert => TransferError::BatchWrite(error.to_string()),
            Operation::Read | Operation::Metadata => TransferError::SourceRead(error.to_string()),
            Operation::Ping | Operation::CreateTable => TransferError::Connection(error.to_string()),
        }
    }

    fn status_error(
        &self,
        status: StatusCode,
        body: &str,
        operation: Operation,
        table: Option<&str>,
    ) -> TransferError {
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || body.contains("AUTHENTICATION_FAILED")
        {
            return TransferError::Connection(format!(
                "ClickHouse rejected the credentials of user '{}': {body}",
                self.opts.user
            ));
        }
        if body.contains("UNKNOWN_DATABASE") {
            return TransferError::Connection(format!(
                "Database '{}' does not exist: {body}",
                self.opts.database
            ));
        }
        if let Some(table) = table {
            if body.contains("UNKNOWN_TABLE") {
                return SchemaError::TableNotFound(table.to_string()).into();
            }
        }
        let message = format!("HTTP {status}: {body}");
        match operation {
            Operation::Insert | Operation::CreateTable => TransferError::BatchWrite(message),
            Operation::Read | Operation::Metadata => TransferError::SourceRead(message),
            Operation::Ping => TransferError::Connection(message),
        }
    }
}

#[async_trait::async_trait]
impl StoreAdapter for ClickHouseStore {
    async fn ping(&self) -> Result<(), TransferError> {
        // Unlike GET /ping, a query also checks the credentials and database
        self.execute("SELECT 1".to_string(), Operation::Ping, None)
            .await
            .map(|_| ())
    }

    async fn list_tables(&self) -> Result<Vec<String>, TransferError> {
        let sql = format!(
            "SHOW TABLES FROM {} FORMAT JSONEachRow",
            quote_identifier(&self.opts.database)?
        );
        let body = self.execute(sql, Operation::Metadata, None).await?;
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<ShowTablesRow>(line)
                    .map(|row| row.name)
                    .map_err(|e| TransferError::SourceRead(format!("Malformed table list: {e}")))
            })
            .collect()
    }

    async fn table_exists(&self, table: &str) -> Result<bool, TransferError> {
        let sql = format!(
            "EXISTS TABLE {} FORMAT TabSeparated",
            qualified_table_name(&self.opts.database, table)?
        );
        let body = self.execute(sql, Operation::Metadata, Some(table)).await?;
        Ok(body.trim() == "1")
    }

    async fn fetch_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, TransferError> {
        let sql = format!(
            "DESCRIBE TABLE {} FORMAT JSONEachRow",
            qualified_table_name(&self.opts.database, table)?
        );
        let body = self.execute(sql, Operation::Metadata, Some(table)).await?;
        let columns = body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let row: DescribeRow = serde_json::from_str(line).map_err(|e| {
                    TransferError::SourceRead(format!("Malformed schema of '{table}': {e}"))
                })?;
                let (inferred_type, nullable) = clickhouse_type_to_inferred(&row.column_type);
                Ok(ColumnDescriptor {
                    name: row.name,
                    inferred_type,
                    nullable,
                })
            })
            .collect::<Result<Vec<_>, TransferError>>()?;

        if columns.is_empty() {
            return Err(SchemaError::TableNotFound(table.to_string()).into());
        }
        Ok(columns)
    }

    async fn query_rows(
        &self,
        query: &StoreQuery,
        limit: Option<u64>,
    ) -> Result<StoreRowStream, TransferError> {
        let (sql, table, stream_limit) = match query {
            StoreQuery::Table { table, columns } => (
                select_statement(&self.opts.database, table, columns, limit)?,
                Some(table.as_str()),
                None,
            ),
            StoreQuery::Raw(sql) => (
                sql.trim().trim_end_matches(';').to_string(),
                None,
                limit,
            ),
        };
        debug!("ClickHouse query: {sql}");

        let response = self
            .send(
                self.request(&[
                    ("default_format", COMPACT_FORMAT),
                    ("output_format_json_quote_decimals", "1"),
                ])
                .body(sql),
                Operation::Read,
                table,
            )
            .await?;

        let bytes = Box::pin(response.bytes_stream().map_err(std::io::Error::other));
        read_compact_rows(BufReader::new(StreamReader::new(bytes)), stream_limit).await
    }

    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        rows: &[Row],
    ) -> Result<(), TransferError> {
        if rows.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let statement = insert_statement(&self.opts.database, table, &names)?;

        let mut body = String::new();
        for row in rows {
            body.push_str(&row_to_json_line(row, columns)?);
            body.push('\n');
        }

        debug!("ClickHouse insert of {} rows into {table}", rows.len());
        self.send(
            self.request(&[
                ("query", statement.as_str()),
                ("date_time_input_format", "best_effort"),
            ])
            .body(body),
            Operation::Insert,
            Some(table),
        )
        .await?;
        Ok(())
    }

    async fn create_table(
        &self,
        table: &str,
        columns: &[DestinationColumnDef],
    ) -> Result<(), TransferError> {
        let sql = create_table_statement(&self.opts.database, table, columns)?;
        self.execute(sql, Operation::CreateTable, Some(table))
            .await
            .map(|_| ())
    }
}
