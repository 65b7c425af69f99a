//! Import, export and YAML-described transfers.
//!
//! Every handler builds a [`TransferRequest`], runs it and prints the
//! [`TransferResult`] as JSON. A result that is not a full success turns into
//! an error so the process exits non-zero.

use super::print_json;
use crate::config::TransferFile;
use crate::{ClickHouseArgs, FileArgs, TransferArgs};
use anyhow::Context;
use csv_types::Delimiter;
use flatfile_sync_transfer::{
    plan_transfer, run_transfer, DestinationDescriptor, FanoutObserver, FileSpec,
    MetricsCollector, SourceDescriptor, TracingObserver, TransferRequest,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sync_core::{ColumnSelection, TransferResult};
use tokio_util::sync::CancellationToken;

/// How often throughput snapshots are appended with `--emit-metrics`
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

pub fn import_request(
    file: &FileArgs,
    table: &str,
    columns: ColumnSelection,
    create_table: bool,
    transfer: &TransferArgs,
) -> anyhow::Result<TransferRequest> {
    let mut request = TransferRequest::new(
        SourceDescriptor::File(FileSpec::new(&file.file, file.delimiter)),
        DestinationDescriptor::Store {
            table: table.to_string(),
        },
    );
    request.selected_columns = columns;
    request.create_destination_if_absent = create_table;
    transfer.apply(&mut request)?;
    Ok(request)
}

pub fn export_request(
    table: &str,
    columns: ColumnSelection,
    output: &Path,
    delimiter: Delimiter,
    transfer: &TransferArgs,
) -> anyhow::Result<TransferRequest> {
    let mut request = TransferRequest::new(
        SourceDescriptor::Store {
            table: Some(table.to_string()),
            query: None,
        },
        output_destination(output, delimiter),
    );
    request.selected_columns = columns;
    transfer.apply(&mut request)?;
    Ok(request)
}

pub fn export_query_request(
    query: &str,
    output: &Path,
    delimiter: Delimiter,
    transfer: &TransferArgs,
) -> anyhow::Result<TransferRequest> {
    let mut request = TransferRequest::new(
        SourceDescriptor::Store {
            table: None,
            query: Some(query.to_string()),
        },
        output_destination(output, delimiter),
    );
    transfer.apply(&mut request)?;
    Ok(request)
}

fn output_destination(output: &Path, delimiter: Delimiter) -> DestinationDescriptor {
    DestinationDescriptor::File(FileSpec::new(output.display().to_string(), delimiter))
}

pub async fn import(
    clickhouse: ClickHouseArgs,
    file: FileArgs,
    table: String,
    columns: ColumnSelection,
    create_table: bool,
    transfer: TransferArgs,
) -> anyhow::Result<()> {
    let request = import_request(&file, &table, columns, create_table, &transfer)?;
    report(execute(request, &clickhouse, transfer.emit_metrics).await?)
}

pub async fn export(
    clickhouse: ClickHouseArgs,
    table: String,
    columns: ColumnSelection,
    output: PathBuf,
    delimiter: Delimiter,
    transfer: TransferArgs,
) -> anyhow::Result<()> {
    let request = export_request(&table, columns, &output, delimiter, &transfer)?;
    report(execute(request, &clickhouse, transfer.emit_metrics).await?)
}

pub async fn export_query(
    clickhouse: ClickHouseArgs,
    query: String,
    output: PathBuf,
    delimiter: Delimiter,
    transfer: TransferArgs,
) -> anyhow::Result<()> {
    let request = export_query_request(&query, &output, delimiter, &transfer)?;
    report(execute(request, &clickhouse, transfer.emit_metrics).await?)
}

pub async fn run_config(
    clickhouse: ClickHouseArgs,
    config: PathBuf,
    emit_metrics: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = TransferFile::from_file(&config)?.into_request()?;
    report(execute(request, &clickhouse, emit_metrics).await?)
}

/// Plan and run `request` against the configured ClickHouse server.
///
/// Ctrl+C stops the transfer between batches; the partial result is still
/// returned.
pub async fn execute(
    request: TransferRequest,
    clickhouse: &ClickHouseArgs,
    emit_metrics: Option<PathBuf>,
) -> anyhow::Result<TransferResult> {
    let plan = plan_transfer(request).context("Invalid transfer request")?;
    let store = clickhouse.connect()?;

    let mut observer = FanoutObserver::new().with(Arc::new(TracingObserver));
    let metrics = emit_metrics.map(|path| Arc::new(MetricsCollector::new(path)));
    let emission = match &metrics {
        Some(collector) => {
            observer = observer.with(collector.clone());
            Some(collector.start_emission_task(METRICS_INTERVAL))
        }
        None => None,
    };

    let cancel = cancel_on_ctrl_c();
    let result = run_transfer(&plan, &store, Arc::new(observer), cancel.clone()).await;
    cancel.cancel();

    if let Some(handle) = emission {
        handle.abort();
    }
    if let Some(collector) = &metrics {
        collector
            .emit_snapshot()
            .await
            .context("Failed to write final metrics snapshot")?;
    }

    Ok(result)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if signal.is_ok() {
                    tracing::info!("Received interrupt signal (Ctrl+C), stopping after the current batch");
                    watched.cancel();
                }
            }
            _ = watched.cancelled() => {}
        }
    });

    token
}

fn report(result: TransferResult) -> anyhow::Result<()> {
    print_json(&result)?;
    if result.is_success() {
        return Ok(());
    }
    match &result.first_error {
        Some(error) => anyhow::bail!("Transfer failed: {}", error.message),
        None if result.cancelled => anyhow::bail!("Transfer cancelled"),
        None => anyhow::bail!(
            "Transfer incomplete: {} of {} batches written",
            result.batches_succeeded,
            result.batches_attempted
        ),
    }
}
