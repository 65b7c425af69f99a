//! clickhouse-flatfile-sync
//!
//! Moves rows between ClickHouse tables and delimited flat files (CSV, TSV,
//! pipe- or semicolon-separated), in batches, with column types inferred from
//! the file when the destination table has to be created.
//!
//! # Crates
//!
//! - `sync_core` - rows, values, column descriptors, errors and transfer results
//! - `csv_types` - type inference and delimited field conversions
//! - `clickhouse_types` - ClickHouse DDL, SQL text and JSON row conversions
//! - `clickhouse_sink` - the ClickHouse HTTP store adapter
//! - `flatfile_sync_file` - local and HTTP delimited readers, local writer
//! - `flatfile_sync_transfer` - planning, selection resolution and the batch engine
//!
//! # CLI Usage
//!
//! ```bash
//! # Infer the schema of a file
//! ch-flatfile-sync infer --file data/events.csv
//!
//! # Import a TSV file, creating the table from the inferred schema
//! ch-flatfile-sync import --file data/events.tsv --delimiter tab \
//!   --table events --create-table --clickhouse-endpoint http://localhost:8123
//!
//! # Export two columns of a table
//! ch-flatfile-sync export --table events --columns id,name --output out/events.csv
//!
//! # Export the result of a query
//! ch-flatfile-sync export-query --query "SELECT id, count() AS n FROM events GROUP BY id" \
//!   --output out/counts.csv
//!
//! # Run a transfer described in YAML
//! ch-flatfile-sync run --config transfer.yaml
//! ```

use anyhow::Context;
use clap::Parser;
use clickhouse_sink::{ClickHouseOpts, ClickHouseStore};
use csv_types::Delimiter;
use flatfile_sync_transfer::{FailureMode, TransferRequest, DEFAULT_BATCH_SIZE};
use std::path::PathBuf;
use std::time::Duration;

pub mod commands;
pub mod config;

#[derive(Parser, Clone, Debug)]
pub struct ClickHouseArgs {
    /// ClickHouse HTTP endpoint URL
    #[arg(
        long,
        default_value = "http://localhost:8123",
        env = "CLICKHOUSE_ENDPOINT"
    )]
    pub clickhouse_endpoint: String,

    /// ClickHouse database
    #[arg(long, default_value = "default", env = "CLICKHOUSE_DATABASE")]
    pub clickhouse_database: String,

    /// ClickHouse user
    #[arg(long, default_value = "default", env = "CLICKHOUSE_USER")]
    pub clickhouse_user: String,

    /// ClickHouse password
    #[arg(long, default_value = "", env = "CLICKHOUSE_PASSWORD")]
    pub clickhouse_password: String,
}

impl ClickHouseArgs {
    pub fn to_opts(&self) -> ClickHouseOpts {
        ClickHouseOpts::new(
            &self.clickhouse_endpoint,
            &self.clickhouse_database,
            &self.clickhouse_user,
            &self.clickhouse_password,
        )
    }

    pub fn connect(&self) -> anyhow::Result<ClickHouseStore> {
        ClickHouseStore::new(self.to_opts())
            .with_context(|| format!("Failed to set up client for {}", self.clickhouse_endpoint))
    }
}

#[derive(Parser, Clone, Debug)]
pub struct FileArgs {
    /// Local path or HTTP(S) URL of the delimited file
    #[arg(long, value_name = "PATH_OR_URL")]
    pub file: String,

    /// Field delimiter: comma, tab, semicolon, pipe or a single character
    #[arg(long, default_value = "comma")]
    pub delimiter: Delimiter,
}

#[derive(Parser, Clone, Debug)]
pub struct TransferArgs {
    /// Rows per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Keep going after a failed batch instead of stopping
    #[arg(long)]
    pub best_effort: bool,

    /// Timeout for each read, write and metadata query ("300", "300s", "30m", "1h")
    #[arg(long, default_value = "300")]
    pub timeout: String,

    /// Append JSON-lines throughput snapshots to this file
    #[arg(long, value_name = "PATH")]
    pub emit_metrics: Option<PathBuf>,
}

impl TransferArgs {
    pub fn failure_mode(&self) -> FailureMode {
        if self.best_effort {
            FailureMode::BestEffort
        } else {
            FailureMode::FailFast
        }
    }

    pub fn io_timeout(&self) -> anyhow::Result<Duration> {
        config::parse_duration(&self.timeout).context("Invalid --timeout")
    }

    /// Copy the batch, failure and timeout settings into `request`.
    pub fn apply(&self, request: &mut TransferRequest) -> anyhow::Result<()> {
        request.batch_size = self.batch_size;
        request.failure_mode = self.failure_mode();
        request.io_timeout = self.io_timeout()?;
        Ok(())
    }
}
