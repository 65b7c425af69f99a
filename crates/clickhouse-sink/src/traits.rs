//! StoreAdapter trait definition.

use crate::StoreRowStream;
use clickhouse_types::DestinationColumnDef;
use sync_core::{ColumnDescriptor, Row, TransferError};

/// What to read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreQuery {
    /// Selected columns of one table, in the given order
    Table { table: String, columns: Vec<String> },

    /// A read-only statement, run as-is
    Raw(String),
}

/// Trait for reading from and writing to the analytical store.
///
/// Implementations map their failures onto [`TransferError`] kinds:
/// unreachable store or rejected credentials are `Connection`, missing
/// tables are `Schema`, rejected inserts are `BatchWrite`.
///
/// # Usage Pattern
///
/// Transfer code is generic over the adapter:
///
/// ```ignore
/// pub async fn run_transfer<S: StoreAdapter>(plan: &TransferPlan, store: &S) -> TransferResult {
///     store.insert_batch(&table, &columns, &rows).await?;
/// }
/// ```
#[async_trait::async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Check that the store is reachable and accepts the credentials.
    async fn ping(&self) -> Result<(), TransferError>;

    /// Names of the tables in the configured database.
    async fn list_tables(&self) -> Result<Vec<String>, TransferError>;

    async fn table_exists(&self, table: &str) -> Result<bool, TransferError>;

    /// Columns of `table` in table order.
    ///
    /// Fails with `SchemaError::TableNotFound` when the table does not exist.
    async fn fetch_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, TransferError>;

    /// Start reading rows. The returned stream announces the result columns
    /// before the first row is pulled. `limit` caps the number of rows.
    async fn query_rows(
        &self,
        query: &StoreQuery,
        limit: Option<u64>,
    ) -> Result<StoreRowStream, TransferError>;

    /// Insert `rows` as one write. Only `columns` are sent, in order.
    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        rows: &[Row],
    ) -> Result<(), TransferError>;

    /// Create `table` unless it exists. Calling it again is a no-op.
    async fn create_table(
        &self,
        table: &str,
        columns: &[DestinationColumnDef],
    ) -> Result<(), TransferError>;
}
