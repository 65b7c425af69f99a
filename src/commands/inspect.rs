//! Read-only commands: nothing here writes to the store or the filesystem.

use super::print_json;
use crate::{ClickHouseArgs, FileArgs};
use anyhow::Context;
use clickhouse_sink::StoreAdapter;
use flatfile_sync_file::FileSource;
use flatfile_sync_transfer::{inspect_file, preview_file, preview_table, with_timeout};
use std::time::Duration;
use sync_core::ColumnSelection;

fn parse_source(file: &FileArgs) -> anyhow::Result<FileSource> {
    FileSource::parse(&file.file).with_context(|| format!("Invalid file location: {}", file.file))
}

/// Infer column types from the first `sample_rows` records of a file.
pub async fn infer(file: FileArgs, sample_rows: usize) -> anyhow::Result<()> {
    let source = parse_source(&file)?;
    tracing::info!("Inferring schema of {source} from up to {sample_rows} rows");
    let snapshot = inspect_file(&source, file.delimiter, sample_rows)
        .await
        .with_context(|| format!("Failed to inspect {source}"))?;
    print_json(&snapshot)
}

pub async fn preview_file_records(file: FileArgs, limit: usize) -> anyhow::Result<()> {
    let source = parse_source(&file)?;
    let preview = preview_file(&source, file.delimiter, limit)
        .await
        .with_context(|| format!("Failed to preview {source}"))?;
    print_json(&preview)
}

pub async fn ping(clickhouse: ClickHouseArgs) -> anyhow::Result<()> {
    let store = clickhouse.connect()?;
    store
        .ping()
        .await
        .with_context(|| format!("Failed to reach {}", clickhouse.clickhouse_endpoint))?;
    tracing::info!(
        "Connected to {} (database {})",
        clickhouse.clickhouse_endpoint,
        clickhouse.clickhouse_database
    );
    println!("ok");
    Ok(())
}

pub async fn tables(clickhouse: ClickHouseArgs) -> anyhow::Result<()> {
    let store = clickhouse.connect()?;
    let tables = store
        .list_tables()
        .await
        .context("Failed to list tables")?;
    print_json(&tables)
}

pub async fn describe(
    clickhouse: ClickHouseArgs,
    table: String,
    timeout: Duration,
) -> anyhow::Result<()> {
    let store = clickhouse.connect()?;
    let columns = with_timeout("schema fetch", timeout, store.fetch_schema(&table))
        .await
        .with_context(|| format!("Failed to describe table '{table}'"))?;
    print_json(&columns)
}

pub async fn preview(
    clickhouse: ClickHouseArgs,
    table: String,
    columns: ColumnSelection,
    limit: usize,
    timeout: Duration,
) -> anyhow::Result<()> {
    let store = clickhouse.connect()?;
    let preview = preview_table(&store, &table, &columns, limit, timeout)
        .await
        .with_context(|| format!("Failed to preview table '{table}'"))?;
    print_json(&preview)
}
