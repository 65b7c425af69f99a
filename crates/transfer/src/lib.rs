//! Batched transfers between a ClickHouse store and delimited files.
//!
//! A transfer goes through three steps:
//!
//! 1. [`plan_transfer`] validates a [`TransferRequest`] without any I/O.
//! 2. The resolver fixes the column projection: file header plus inferred or
//!    destination types for imports, table schema or query header for exports.
//! 3. The [`TransferEngine`] pulls the source in batches of `batch_size`,
//!    transcodes every record and writes each batch to the sink.
//!
//! # Example
//!
//! ```ignore
//! use flatfile_sync_transfer::{plan_transfer, run_transfer, TracingObserver};
//!
//! let plan = plan_transfer(request)?;
//! let result = run_transfer(&plan, &store, Arc::new(TracingObserver), cancel).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

pub mod engine;
pub mod events;
pub mod metrics;
pub mod request;
pub mod resolver;
pub mod run;
pub mod sinks;
pub mod sources;

pub use engine::{
    with_timeout, BatchSink, FailureMode, RowSource, TransferEngine, TransferOptions,
    DEFAULT_BATCH_SIZE, DEFAULT_IO_TIMEOUT,
};
pub use events::{FanoutObserver, TracingObserver, TransferEvent, TransferObserver};
pub use metrics::{MetricsCollector, MetricsEntry};
pub use request::{
    check_read_only, plan_transfer, DestinationDescriptor, ExportQuery, FileSpec,
    SourceDescriptor, TransferDirection, TransferPlan, TransferRequest, READ_ONLY_KEYWORDS,
};
pub use resolver::{open_export_stream, resolve_import_columns, select_header_columns};
pub use run::{
    inspect_file, preview_file, preview_table, run_transfer, FilePreview, TablePreview,
};
pub use sinks::{FileSink, StoreSink};
pub use sources::{FileRowSource, StoreRowSource};
