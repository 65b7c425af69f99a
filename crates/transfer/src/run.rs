//! Entry points: run a planned transfer, inspect and preview either side.

use crate::engine::{with_timeout, TransferEngine};
use crate::events::{TransferEvent, TransferObserver};
use crate::request::{ExportQuery, TransferDirection, TransferPlan};
use crate::resolver::{open_export_stream, resolve_import_columns};
use crate::sinks::{FileSink, StoreSink};
use crate::sources::{FileRowSource, StoreRowSource};
use clickhouse_sink::{StoreAdapter, StoreQuery};
use csv_types::{infer_schema, Delimiter};
use flatfile_sync_file::{read_delimited, read_delimited_sample, DelimitedWriter, FileSource};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{
    map_to_source_projection, ColumnDescriptor, ColumnSelection, RawRecord, Row, SchemaSnapshot,
    TransferError, TransferResult,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run `plan` against `store`.
///
/// Never fails: setup errors (unreadable file, missing table, ...) are
/// reported through the result's `first_error` like any other failure.
pub async fn run_transfer<A>(
    plan: &TransferPlan,
    store: &A,
    observer: Arc<dyn TransferObserver>,
    cancel: CancellationToken,
) -> TransferResult
where
    A: StoreAdapter + ?Sized,
{
    let engine = TransferEngine::new(plan.options)
        .with_observer(observer.clone())
        .with_cancellation(cancel);

    let outcome = match &plan.direction {
        TransferDirection::Import {
            source,
            delimiter,
            table,
            selection,
            create_table,
        } => {
            info!("Importing {source} into table {table}");
            run_import(
                &engine,
                store,
                source,
                *delimiter,
                table,
                selection,
                *create_table,
            )
            .await
        }
        TransferDirection::Export {
            query,
            output,
            delimiter,
        } => {
            match query {
                ExportQuery::Table { table, .. } => {
                    info!("Exporting table {table} to {}", output.display())
                }
                ExportQuery::Raw { .. } => info!("Exporting query result to {}", output.display()),
            }
            run_export(&engine, store, query, output, *delimiter).await
        }
    };

    outcome.unwrap_or_else(|error| {
        let mut result = TransferResult::default();
        result.record_error(error.descriptor());
        observer.on_event(&TransferEvent::TransferFinished { result: &result });
        result
    })
}

async fn run_import<A>(
    engine: &TransferEngine,
    store: &A,
    source: &FileSource,
    delimiter: Delimiter,
    table: &str,
    selection: &ColumnSelection,
    create_table: bool,
) -> Result<TransferResult, TransferError>
where
    A: StoreAdapter + ?Sized,
{
    let io_timeout = engine.options().io_timeout;
    let reader = with_timeout("open source", io_timeout, async {
        Ok::<_, TransferError>(read_delimited(source, delimiter, None).await?)
    })
    .await?;
    let headers = reader.headers().to_vec();

    let columns = resolve_import_columns(
        store,
        source,
        delimiter,
        &headers,
        table,
        selection,
        create_table,
        io_timeout,
    )
    .await?;
    let names = column_names(&columns);

    let mut rows = FileRowSource::new(reader, columns.clone())?;
    let mut sink = StoreSink::new(store, table, columns);
    Ok(engine.run(&mut rows, &mut sink, names).await)
}

async fn run_export<A>(
    engine: &TransferEngine,
    store: &A,
    query: &ExportQuery,
    output: &Path,
    delimiter: Delimiter,
) -> Result<TransferResult, TransferError>
where
    A: StoreAdapter + ?Sized,
{
    let stream = open_export_stream(store, query, engine.options().io_timeout).await?;
    let mut rows = StoreRowSource::new(stream);
    let columns = rows.columns().to_vec();
    let names = column_names(&columns);

    let writer = DelimitedWriter::create(output, delimiter, &names)
        .await
        .map_err(|e| TransferError::BatchWrite(e.to_string()))?;
    let mut sink = FileSink::new(writer, columns);
    Ok(engine.run(&mut rows, &mut sink, names).await)
}

fn column_names(columns: &[ColumnDescriptor]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Infer the schema of a delimited file from its first `sample_rows` records.
pub async fn inspect_file(
    source: &FileSource,
    delimiter: Delimiter,
    sample_rows: usize,
) -> Result<SchemaSnapshot, TransferError> {
    let (headers, sample) = read_delimited_sample(source, delimiter, sample_rows).await?;
    Ok(infer_schema(&headers, &sample))
}

/// First records of a delimited file, untyped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePreview {
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

pub async fn preview_file(
    source: &FileSource,
    delimiter: Delimiter,
    limit: usize,
) -> Result<FilePreview, TransferError> {
    let (headers, records) = read_delimited_sample(source, delimiter, limit).await?;
    Ok(FilePreview { headers, records })
}

/// First rows of a table, typed by the table schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
}

pub async fn preview_table<A>(
    store: &A,
    table: &str,
    selection: &ColumnSelection,
    limit: usize,
    io_timeout: Duration,
) -> Result<TablePreview, TransferError>
where
    A: StoreAdapter + ?Sized,
{
    selection.validate()?;
    let schema = with_timeout("schema fetch", io_timeout, store.fetch_schema(table)).await?;
    let context = format!("table '{table}'");
    let columns = map_to_source_projection(selection, &schema, &context)?;

    let query = StoreQuery::Table {
        table: table.to_string(),
        columns: column_names(&columns),
    };
    let limit_rows = Some(limit as u64);
    let mut stream = with_timeout("query", io_timeout, store.query_rows(&query, limit_rows)).await?;
    let records = with_timeout("query", io_timeout, stream.read_batch(limit)).await?;

    let columns = stream.columns().to_vec();
    let rows = records
        .into_iter()
        .map(|record| record.into_row(&columns))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TablePreview { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FailureMode;
    use crate::events::TracingObserver;
    use crate::request::{
        plan_transfer, DestinationDescriptor, FileSpec, SourceDescriptor, TransferRequest,
    };
    use clickhouse_sink::memory::MemoryStore;
    use sync_core::{ErrorKind, InferredType, Value};
    use tempfile::TempDir;

    fn observer() -> Arc<dyn TransferObserver> {
        Arc::new(TracingObserver)
    }

    async fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path.display().to_string()
    }

    fn import_request(location: &str, table: &str) -> TransferRequest {
        TransferRequest::new(
            SourceDescriptor::File(FileSpec::new(location, Delimiter::Comma)),
            DestinationDescriptor::Store {
                table: table.into(),
            },
        )
    }

    fn export_request(table: Option<&str>, query: Option<&str>, output: &str) -> TransferRequest {
        TransferRequest::new(
            SourceDescriptor::Store {
                table: table.map(str::to_string),
                query: query.map(str::to_string),
            },
            DestinationDescriptor::File(FileSpec::new(output, Delimiter::Comma)),
        )
    }

    async fn run(request: TransferRequest, store: &MemoryStore) -> TransferResult {
        let plan = plan_transfer(request).unwrap();
        run_transfer(&plan, store, observer(), CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_import_in_batches_with_create() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n").await;
        let store = MemoryStore::new();

        let mut request = import_request(&file, "users");
        request.batch_size = 2;
        request.create_destination_if_absent = true;
        let result = run(request, &store).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.rows_transferred, 5);
        assert_eq!(result.batches_attempted, 3);
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(store.insert_calls(), 3);
        let rows = store.rows("users");
        assert_eq!(rows[4].get("id"), Some(&Value::Integer(5)));
    }

    #[tokio::test]
    async fn test_import_twice_with_create_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id\n1\n2\n").await;
        let store = MemoryStore::new();

        for _ in 0..2 {
            let mut request = import_request(&file, "t");
            request.create_destination_if_absent = true;
            assert!(run(request, &store).await.is_success());
        }
        assert_eq!(store.create_calls(), 2);
        assert_eq!(store.rows("t").len(), 4);
    }

    #[tokio::test]
    async fn test_import_fail_fast_keeps_written_batches() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id\n1\n2\n3\n4\n5\n").await;
        let store = MemoryStore::new()
            .with_table("t", vec![ColumnDescriptor::new("id", InferredType::Integer)], vec![])
            .failing_insert(1);

        let mut request = import_request(&file, "t");
        request.batch_size = 2;
        let result = run(request, &store).await;

        assert!(!result.is_success());
        assert_eq!(result.rows_transferred, 2);
        assert_eq!(result.batches_attempted, 2);
        assert_eq!(store.rows("t").len(), 2);
        let error = result.first_error.unwrap();
        assert_eq!(error.kind, ErrorKind::BatchWrite);
        assert_eq!(error.batch_index, Some(1));

        let mut request = import_request(&file, "t");
        request.batch_size = 2;
        request.failure_mode = FailureMode::BestEffort;
        let store = MemoryStore::new()
            .with_table("t", vec![ColumnDescriptor::new("id", InferredType::Integer)], vec![])
            .failing_insert(1);
        let result = run(request, &store).await;
        assert_eq!(result.rows_transferred, 3);
        assert_eq!(result.batches_succeeded, 2);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_rows() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id,name\n1,a\nx,b\n3\n4,d\n").await;
        let store = MemoryStore::new().with_table(
            "t",
            vec![
                ColumnDescriptor::new("id", InferredType::Integer),
                ColumnDescriptor::nullable("name", InferredType::Text),
            ],
            vec![],
        );
        let result = run(import_request(&file, "t"), &store).await;

        assert!(result.is_success());
        assert_eq!(result.rows_transferred, 2);
        assert_eq!(result.rows_rejected, 2);
        assert_eq!(
            result.rejections.iter().map(|r| r.row_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_import_rejects_undecodable_row_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names.csv");
        tokio::fs::write(&path, b"name\nalice\nb\xffb\ncarol\ndave\n")
            .await
            .unwrap();
        let store = MemoryStore::new().with_table(
            "t",
            vec![ColumnDescriptor::new("name", InferredType::Text)],
            vec![],
        );

        let mut request = import_request(&path.display().to_string(), "t");
        request.batch_size = 10;
        let result = run(request, &store).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.rows_transferred, 3);
        assert_eq!(result.rows_rejected, 1);
        assert_eq!(result.batches_succeeded, 1);
        assert_eq!(result.rejections[0].row_index, 1);
        let names = store
            .rows("t")
            .iter()
            .map(|row| row.get("name").cloned())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                Some(Value::Text("alice".into())),
                Some(Value::Text("carol".into())),
                Some(Value::Text("dave".into())),
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_errors_are_reported_in_result() {
        let store = MemoryStore::new();
        let result = run(import_request("/nonexistent/file.csv", "t"), &store).await;
        assert_eq!(result.first_error.unwrap().kind, ErrorKind::SourceRead);

        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id\n1\n").await;
        let result = run(import_request(&file, "missing"), &store).await;
        assert_eq!(result.first_error.unwrap().kind, ErrorKind::Schema);

        let down = MemoryStore::new().unreachable();
        let mut request = import_request(&file, "t");
        request.create_destination_if_absent = true;
        let result = run(request, &down).await;
        assert_eq!(result.first_error.unwrap().kind, ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_export_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "in.csv", "id,note,at\n1,,2024-01-02T03:04:05\n2,x,\n").await;
        let store = MemoryStore::new();

        let mut request = import_request(&input, "t");
        request.create_destination_if_absent = true;
        assert!(run(request, &store).await.is_success());

        let output = dir.path().join("out").join("t.csv").display().to_string();
        let mut request = export_request(Some("t"), None, &output);
        request.selected_columns = ColumnSelection::Named(vec!["note".into(), "id".into()]);
        let result = run(request, &store).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.columns, vec!["note", "id"]);
        let content = tokio::fs::read_to_string(&output).await.unwrap();
        assert_eq!(content, "note,id\n,1\nx,2\n");

        let all = dir.path().join("all.csv").display().to_string();
        assert!(run(export_request(Some("t"), None, &all), &store).await.is_success());
        let content = tokio::fs::read_to_string(&all).await.unwrap();
        assert_eq!(content, "id,note,at\n1,,2024-01-02 03:04:05\n2,x,\n");
    }

    #[tokio::test]
    async fn test_export_raw_query_ignores_selection() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("q.csv").display().to_string();
        let store = MemoryStore::new().with_query_result(
            "SELECT a, b FROM t",
            vec![
                ColumnDescriptor::new("a", InferredType::Integer),
                ColumnDescriptor::new("b", InferredType::Boolean),
            ],
            vec![
                vec![serde_json::json!("1"), serde_json::json!(1)],
                vec![serde_json::json!("2"), serde_json::json!(0)],
            ],
        );
        let mut request = export_request(None, Some("SELECT a, b FROM t"), &output);
        request.selected_columns = ColumnSelection::Named(vec!["b".into()]);
        let result = run(request, &store).await;

        assert!(result.is_success());
        assert_eq!(result.columns, vec!["a", "b"]);
        let content = tokio::fs::read_to_string(&output).await.unwrap();
        assert_eq!(content, "a,b\n1,true\n2,false\n");
    }

    #[tokio::test]
    async fn test_cancelled_transfer() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "u.csv", "id\n1\n").await;
        let store = MemoryStore::new();
        let mut request = import_request(&file, "t");
        request.create_destination_if_absent = true;
        let plan = plan_transfer(request).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_transfer(&plan, &store, observer(), cancel).await;
        assert!(result.cancelled);
        assert!(store.rows("t").is_empty());
    }

    #[tokio::test]
    async fn test_inspect_and_preview_file() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "p.csv", "n;flag\n1;yes\n2;no\n3;\n").await;
        let source = FileSource::parse(&file).unwrap();

        let snapshot = inspect_file(&source, Delimiter::Semicolon, 100).await.unwrap();
        assert_eq!(
            snapshot.columns,
            vec![
                ColumnDescriptor::new("n", InferredType::Integer),
                ColumnDescriptor::nullable("flag", InferredType::Text),
            ]
        );
        assert_eq!(snapshot.sample_rows.len(), 3);

        let preview = preview_file(&source, Delimiter::Semicolon, 2).await.unwrap();
        assert_eq!(preview.headers, vec!["n", "flag"]);
        assert_eq!(preview.records.len(), 2);
    }

    #[tokio::test]
    async fn test_preview_table() {
        let store = MemoryStore::new().with_table(
            "t",
            vec![
                ColumnDescriptor::new("a", InferredType::Integer),
                ColumnDescriptor::new("b", InferredType::Text),
            ],
            (0..5)
                .map(|i| {
                    Row::from_pairs(i, vec![("a", Value::Integer(i as i64)), ("b", Value::from("x"))])
                })
                .collect(),
        );
        let preview = preview_table(
            &store,
            "t",
            &ColumnSelection::Named(vec!["a".into()]),
            3,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(preview.columns.len(), 1);
        assert_eq!(preview.rows.len(), 3);
        assert_eq!(preview.rows[2].get("a"), Some(&Value::Integer(2)));
    }
}
