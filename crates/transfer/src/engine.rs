//! Batch transfer engine.
//!
//! Pulls records from a [`RowSource`] in batches, transcodes them into
//! [`Row`]s and hands each batch to a [`BatchSink`] as one write. Batches are
//! processed strictly one after another, so at most one batch is held in
//! memory and at most one write is in flight.

use crate::events::{TracingObserver, TransferEvent, TransferObserver};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sync_core::{CoercionError, Row, TransferError, TransferResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(300);

/// What to do when the destination rejects a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop at the first failed batch
    #[default]
    FailFast,
    /// Record the failure and continue with the next batch
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Upper bound on the rows held in memory at once
    pub batch_size: usize,
    pub failure_mode: FailureMode,
    /// Deadline of each batch pull, batch write and metadata query
    pub io_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            failure_mode: FailureMode::default(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Lazy, forward-only record source.
#[async_trait::async_trait]
pub trait RowSource: Send {
    type Record: Send;

    /// Pull up to `max` records. An empty batch ends the transfer.
    async fn next_batch(&mut self, max: usize) -> Result<Vec<Self::Record>, TransferError>;

    /// Convert one record into a row of the transfer's columns.
    fn transcode(&self, record: Self::Record) -> Result<Row, CoercionError>;
}

/// Destination of transcoded batches.
#[async_trait::async_trait]
pub trait BatchSink: Send {
    /// Write one batch. Either the whole batch is accepted or the call fails.
    async fn write_batch(&mut self, rows: &[Row]) -> Result<(), TransferError>;

    /// Flush whatever the sink buffers. Called once, after the last batch.
    async fn finish(&mut self) -> Result<(), TransferError> {
        Ok(())
    }
}

/// Run `future` under `after`, turning expiry into [`TransferError::Timeout`].
pub async fn with_timeout<T, F>(
    operation: &str,
    after: Duration,
    future: F,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| TransferError::timeout(operation, after))?
}

pub struct TransferEngine {
    options: TransferOptions,
    observer: Arc<dyn TransferObserver>,
    cancel: CancellationToken,
}

impl TransferEngine {
    pub fn new(options: TransferOptions) -> Self {
        Self {
            options,
            observer: Arc::new(TracingObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Drive `source` into `sink` until the source is exhausted, a batch fails
    /// in fail-fast mode, the source fails, or the transfer is cancelled.
    ///
    /// Always returns a result, partial when the transfer stopped early.
    /// Batches written before a failure stay written.
    pub async fn run<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        columns: Vec<String>,
    ) -> TransferResult
    where
        S: RowSource + ?Sized,
        K: BatchSink + ?Sized,
    {
        let TransferOptions {
            batch_size,
            failure_mode,
            io_timeout,
        } = self.options;
        let mut result = TransferResult::new(columns);
        info!(
            "Starting transfer of {} columns (batch size {batch_size}, {failure_mode:?})",
            result.columns.len()
        );

        loop {
            if self.cancel.is_cancelled() {
                info!("Transfer cancelled before batch {}", result.batches_attempted);
                result.cancelled = true;
                break;
            }

            let pull = source.next_batch(batch_size);
            let records = match with_timeout("source read", io_timeout, pull).await {
                Ok(records) => records,
                Err(e) => {
                    result.record_error(e.descriptor());
                    break;
                }
            };
            if records.is_empty() {
                break;
            }

            let pulled = records.len();
            let mut rows = Vec::with_capacity(pulled);
            for record in records {
                match source.transcode(record) {
                    Ok(row) => rows.push(row),
                    Err(error) => {
                        self.observer
                            .on_event(&TransferEvent::RowRejected { error: &error });
                        result.record_rejection(error);
                    }
                }
            }
            if rows.is_empty() {
                debug!("All {pulled} records of a batch were rejected; nothing to write");
                continue;
            }

            let batch_index = result.batches_attempted;
            let batch_rows = rows.len();
            result.batches_attempted += 1;
            self.observer.on_event(&TransferEvent::BatchStarted {
                batch_index,
                rows: batch_rows,
            });

            let started = Instant::now();
            match with_timeout("batch write", io_timeout, sink.write_batch(&rows)).await {
                Ok(()) => {
                    result.batches_succeeded += 1;
                    result.rows_transferred += batch_rows as u64;
                    self.observer.on_event(&TransferEvent::BatchFinished {
                        batch_index,
                        rows: batch_rows,
                        elapsed: started.elapsed(),
                    });
                }
                Err(error) => {
                    self.observer.on_event(&TransferEvent::BatchFailed {
                        batch_index,
                        rows: batch_rows,
                        error: &error,
                    });
                    result.record_error(error.descriptor().for_batch(batch_index, batch_rows));
                    if failure_mode == FailureMode::FailFast {
                        break;
                    }
                }
            }
        }

        if let Err(e) = with_timeout("sink flush", io_timeout, sink.finish()).await {
            result.record_error(e.descriptor());
        }

        self.observer
            .on_event(&TransferEvent::TransferFinished { result: &result });
        result
    }
}
