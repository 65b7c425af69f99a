//! In-memory `StoreAdapter` for tests.
//!
//! Tables hold typed rows; queries return them as compact JSON rows the way
//! the HTTP interface would. Failures can be scripted per insert call.

use crate::{CompactRow, StoreAdapter, StoreQuery, StoreRowStream};
use clickhouse_types::{
    clickhouse_type_to_inferred, quote_identifier, row_to_json_line, value_to_json,
    DestinationColumnDef,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use sync_core::{ColumnDescriptor, Row, SchemaError, TransferError, Value};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<String, MemoryTable>,
    raw_results: HashMap<String, (Vec<ColumnDescriptor>, Vec<CompactRow>)>,
    failing_inserts: HashSet<usize>,
    insert_calls: usize,
    create_calls: usize,
    unreachable: bool,
}

/// Shared in-memory store. Clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a table with existing rows.
    pub fn with_table(self, table: &str, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.state()
            .tables
            .insert(table.to_string(), MemoryTable { columns, rows });
        self
    }

    /// Answer `sql` with a fixed result.
    pub fn with_query_result(
        self,
        sql: &str,
        columns: Vec<ColumnDescriptor>,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| CompactRow::new(i as u64, values))
            .collect();
        self.state()
            .raw_results
            .insert(sql.trim().to_string(), (columns, rows));
        self
    }

    /// Make the `call`-th insert (zero-based) fail with a batch write error.
    pub fn failing_insert(self, call: usize) -> Self {
        self.state().failing_inserts.insert(call);
        self
    }

    /// Make every call fail with a connection error.
    pub fn unreachable(self) -> Self {
        self.state().unreachable = true;
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn columns(&self, table: &str) -> Option<Vec<ColumnDescriptor>> {
        self.state().tables.get(table).map(|t| t.columns.clone())
    }

    pub fn insert_calls(&self) -> usize {
        self.state().insert_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    fn check_reachable(&self) -> Result<(), TransferError> {
        if self.state().unreachable {
            return Err(TransferError::Connection("connection refused".into()));
        }
        Ok(())
    }
}

fn to_compact(row: &Row, columns: &[ColumnDescriptor]) -> Result<CompactRow, TransferError> {
    let values = columns
        .iter()
        .map(|column| {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            value_to_json(value, column, row.index())
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompactRow::new(row.index(), values))
}

#[async_trait::async_trait]
impl StoreAdapter for MemoryStore {
    async fn ping(&self) -> Result<(), TransferError> {
        self.check_reachable()
    }

    async fn list_tables(&self) -> Result<Vec<String>, TransferError> {
        self.check_reachable()?;
        Ok(self.state().tables.keys().cloned().collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, TransferError> {
        self.check_reachable()?;
        Ok(self.state().tables.contains_key(table))
    }

    async fn fetch_schema(&self, table: &str) -> Result<Vec<ColumnDescriptor>, TransferError> {
        self.check_reachable()?;
        self.columns(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()).into())
    }

    async fn query_rows(
        &self,
        query: &StoreQuery,
        limit: Option<u64>,
    ) -> Result<StoreRowStream, TransferError> {
        self.check_reachable()?;
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        let state = self.state();

        match query {
            StoreQuery::Table { table, columns } => {
                let stored = state
                    .tables
                    .get(table)
                    .ok_or_else(|| SchemaError::TableNotFound(table.clone()))?;
                let projection = columns
                    .iter()
                    .map(|name| {
                        stored
                            .columns
                            .iter()
                            .find(|c| &c.name == name)
                            .cloned()
                            .ok_or_else(|| SchemaError::ColumnNotFound {
                                column: name.clone(),
                                context: format!("table '{table}'"),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let rows = stored
                    .rows
                    .iter()
                    .take(limit)
                    .map(|row| to_compact(row, &projection))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StoreRowStream::from_rows(projection, rows))
            }
            StoreQuery::Raw(sql) => {
                let (columns, rows) = state.raw_results.get(sql.trim()).cloned().ok_or_else(|| {
                    TransferError::SourceRead(format!("HTTP 400: Syntax error in '{sql}'"))
                })?;
                Ok(StoreRowStream::from_rows(
                    columns,
                    rows.into_iter().take(limit).collect(),
                ))
            }
        }
    }

    async fn insert_batch(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        rows: &[Row],
    ) -> Result<(), TransferError> {
        self.check_reachable()?;
        // Same encoding the HTTP store performs
        for row in rows {
            row_to_json_line(row, columns)?;
        }

        let mut state = self.state();
        let call = state.insert_calls;
        state.insert_calls += 1;
        if state.failing_inserts.contains(&call) {
            return Err(TransferError::BatchWrite(format!(
                "Code: 27. DB::Exception: Cannot parse input (insert {call})"
            )));
        }

        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))?;
        for column in columns {
            if !stored.columns.iter().any(|c| c.name == column.name) {
                return Err(TransferError::BatchWrite(format!(
                    "No such column {} in table {table}",
                    column.name
                )));
            }
        }
        stored.rows.extend(rows.iter().cloned());
        Ok(())
    }

    async fn create_table(
        &self,
        table: &str,
        columns: &[DestinationColumnDef],
    ) -> Result<(), TransferError> {
        self.check_reachable()?;
        if columns.is_empty() {
            return Err(SchemaError::NoColumns(table.to_string()).into());
        }
        quote_identifier(table)?;

        let mut state = self.state();
        state.create_calls += 1;
        state.tables.entry(table.to_string()).or_insert_with(|| {
            let columns = columns
                .iter()
                .map(|def| {
                    let (inferred_type, nullable) = clickhouse_type_to_inferred(&def.column_type);
                    ColumnDescriptor {
                        name: def.name.clone(),
                        inferred_type,
                        nullable,
                    }
                })
                .collect();
            MemoryTable {
                columns,
                rows: Vec::new(),
            }
        });
        Ok(())
    }
}
