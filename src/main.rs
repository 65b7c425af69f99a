//! Command-line interface for clickhouse-flatfile-sync
//!
//! # Usage Examples
//!
//! ## Inspect
//! ```bash
//! # Inferred schema of a local or remote file
//! ch-flatfile-sync infer --file https://example.com/events.csv --sample-rows 500
//!
//! # Columns of a table
//! ch-flatfile-sync describe --table events
//! ```
//!
//! ## Transfer
//! ```bash
//! # Import, creating the table when it is absent
//! ch-flatfile-sync import --file events.csv --table events --create-table
//!
//! # Export, continuing past failed batches
//! ch-flatfile-sync export --table events --output events.csv --best-effort
//! ```
//!
//! Connection settings come from `--clickhouse-*` flags or the
//! `CLICKHOUSE_ENDPOINT`, `CLICKHOUSE_DATABASE`, `CLICKHOUSE_USER` and
//! `CLICKHOUSE_PASSWORD` environment variables. Logging is controlled with
//! `RUST_LOG`.

use clap::{Parser, Subcommand};
use clickhouse_flatfile_sync::commands::{inspect, transfer};
use clickhouse_flatfile_sync::config::parse_duration;
use clickhouse_flatfile_sync::{ClickHouseArgs, FileArgs, TransferArgs};
use csv_types::{Delimiter, DEFAULT_SAMPLE_ROWS};
use std::path::PathBuf;
use sync_core::{ColumnSelection, SAMPLE_PREVIEW_ROWS};

#[derive(Parser)]
#[command(name = "ch-flatfile-sync")]
#[command(about = "Move data between ClickHouse tables and delimited flat files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer column names and types from a sample of a delimited file
    Infer {
        #[command(flatten)]
        file: FileArgs,

        /// Number of records sampled for inference
        #[arg(long, default_value_t = DEFAULT_SAMPLE_ROWS)]
        sample_rows: usize,
    },

    /// Print the first records of a delimited file
    PreviewFile {
        #[command(flatten)]
        file: FileArgs,

        #[arg(long, default_value_t = SAMPLE_PREVIEW_ROWS)]
        limit: usize,
    },

    /// Check that ClickHouse is reachable with the given credentials
    Ping {
        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// List the tables of the configured database
    Tables {
        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Print the columns of a table
    Describe {
        #[arg(long)]
        table: String,

        /// Timeout for the metadata query
        #[arg(long, default_value = "300")]
        timeout: String,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Print the first rows of a table
    Preview {
        #[arg(long)]
        table: String,

        /// Comma-separated column names, or "all"
        #[arg(long, default_value = "all")]
        columns: ColumnSelection,

        #[arg(long, default_value_t = SAMPLE_PREVIEW_ROWS)]
        limit: usize,

        /// Timeout for each query
        #[arg(long, default_value = "300")]
        timeout: String,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Import a delimited file into a table
    Import {
        #[command(flatten)]
        file: FileArgs,

        /// Destination table
        #[arg(long)]
        table: String,

        /// Comma-separated header names to import, or "all"
        #[arg(long, default_value = "all")]
        columns: ColumnSelection,

        /// Create the table from the inferred schema when it does not exist
        #[arg(long)]
        create_table: bool,

        #[command(flatten)]
        transfer: TransferArgs,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Export the columns of a table to a local delimited file
    Export {
        /// Source table
        #[arg(long)]
        table: String,

        /// Comma-separated column names to export, or "all"
        #[arg(long, default_value = "all")]
        columns: ColumnSelection,

        /// Output file, created or truncated
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        #[arg(long, default_value = "comma")]
        delimiter: Delimiter,

        #[command(flatten)]
        transfer: TransferArgs,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Export the result of a read-only query to a local delimited file
    ExportQuery {
        /// SELECT, WITH, SHOW, DESCRIBE or EXPLAIN statement
        #[arg(long)]
        query: String,

        /// Output file, created or truncated
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        #[arg(long, default_value = "comma")]
        delimiter: Delimiter,

        #[command(flatten)]
        transfer: TransferArgs,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },

    /// Run a transfer described in a YAML file
    Run {
        /// Transfer file
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        /// Append JSON-lines throughput snapshots to this file
        #[arg(long, value_name = "PATH")]
        emit_metrics: Option<PathBuf>,

        #[command(flatten)]
        clickhouse: ClickHouseArgs,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Infer { file, sample_rows } => inspect::infer(file, sample_rows).await,
        Commands::PreviewFile { file, limit } => inspect::preview_file_records(file, limit).await,
        Commands::Ping { clickhouse } => inspect::ping(clickhouse).await,
        Commands::Tables { clickhouse } => inspect::tables(clickhouse).await,
        Commands::Describe {
            table,
            timeout,
            clickhouse,
        } => inspect::describe(clickhouse, table, parse_duration(&timeout)?).await,
        Commands::Preview {
            table,
            columns,
            limit,
            timeout,
            clickhouse,
        } => inspect::preview(clickhouse, table, columns, limit, parse_duration(&timeout)?).await,
        Commands::Import {
            file,
            table,
            columns,
            create_table,
            transfer: transfer_args,
            clickhouse,
        } => {
            transfer::import(
                clickhouse,
                file,
                table,
                columns,
                create_table,
                transfer_args,
            )
            .await
        }
        Commands::Export {
            table,
            columns,
            output,
            delimiter,
            transfer: transfer_args,
            clickhouse,
        } => transfer::export(clickhouse, table, columns, output, delimiter, transfer_args).await,
        Commands::ExportQuery {
            query,
            output,
            delimiter,
            transfer: transfer_args,
            clickhouse,
        } => transfer::export_query(clickhouse, query, output, delimiter, transfer_args).await,
        Commands::Run {
            config,
            emit_metrics,
            clickhouse,
        } => transfer::run_config(clickhouse, config, emit_metrics).await,
    }
}
