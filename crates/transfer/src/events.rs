//! Transfer progress events and the observers that consume them.

use std::sync::Arc;
use std::time::Duration;
use sync_core::{CoercionError, TransferError, TransferResult};
use tracing::{debug, info, warn};

/// Something that happened during a transfer.
#[derive(Debug)]
pub enum TransferEvent<'a> {
    /// A batch is about to be written
    BatchStarted { batch_index: usize, rows: usize },

    /// A batch was written
    BatchFinished {
        batch_index: usize,
        rows: usize,
        elapsed: Duration,
    },

    /// The destination rejected a batch
    BatchFailed {
        batch_index: usize,
        rows: usize,
        error: &'a TransferError,
    },

    /// A record could not be transcoded and was dropped
    RowRejected { error: &'a CoercionError },

    /// The transfer ended, successfully or not
    TransferFinished { result: &'a TransferResult },
}

/// Receives transfer events. Called inline from the transfer task, so
/// implementations must not block.
pub trait TransferObserver: Send + Sync {
    fn on_event(&self, event: &TransferEvent<'_>);
}

/// Reports events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent<'_>) {
        match event {
            TransferEvent::BatchStarted { batch_index, rows } => {
                debug!("Writing batch {batch_index} ({rows} rows)");
            }
            TransferEvent::BatchFinished {
                batch_index,
                rows,
                elapsed,
            } => {
                debug!("Batch {batch_index} written: {rows} rows in {elapsed:?}");
            }
            TransferEvent::BatchFailed {
                batch_index,
                rows,
                error,
            } => {
                warn!("Batch {batch_index} ({rows} rows) failed: {error}");
            }
            TransferEvent::RowRejected { error } => {
                warn!("Rejected {error}");
            }
            TransferEvent::TransferFinished { result } => {
                if result.is_success() {
                    info!(
                        "Transfer finished: {} rows in {} batches, {} rows rejected",
                        result.rows_transferred, result.batches_succeeded, result.rows_rejected
                    );
                } else if result.cancelled {
                    warn!(
                        "Transfer cancelled after {} rows in {} batches",
                        result.rows_transferred, result.batches_succeeded
                    );
                } else {
                    warn!(
                        "Transfer failed: {} rows transferred, {}/{} batches written, first error: {}",
                        result.rows_transferred,
                        result.batches_succeeded,
                        result.batches_attempted,
                        result
                            .first_error
                            .as_ref()
                            .map_or("none", |e| e.message.as_str())
                    );
                }
            }
        }
    }
}

/// Forwards every event to each observer in turn.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl TransferObserver for FanoutObserver {
    fn on_event(&self, event: &TransferEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records a one-line summary of every event.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl TransferObserver for RecordingObserver {
        fn on_event(&self, event: &TransferEvent<'_>) {
            let line = match event {
                TransferEvent::BatchStarted { batch_index, rows } => {
                    format!("started {batch_index} {rows}")
                }
                TransferEvent::BatchFinished {
                    batch_index, rows, ..
                } => format!("finished {batch_index} {rows}"),
                TransferEvent::BatchFailed {
                    batch_index, rows, ..
                } => format!("failed {batch_index} {rows}"),
                TransferEvent::RowRejected { error } => format!("rejected {}", error.row_index),
                TransferEvent::TransferFinished { result } => {
                    format!("done {}", result.rows_transferred)
                }
            };
            self.events.lock().unwrap().push(line);
        }
    }

    #[test]
    fn test_fanout_reaches_every_observer() {
        let first = Arc::new(RecordingObserver::default());
        let second = Arc::new(RecordingObserver::default());
        let fanout = FanoutObserver::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingObserver));

        fanout.on_event(&TransferEvent::BatchStarted {
            batch_index: 0,
            rows: 3,
        });
        let error = CoercionError::new(4, "bad");
        fanout.on_event(&TransferEvent::RowRejected { error: &error });

        assert_eq!(first.events(), vec!["started 0 3", "rejected 4"]);
        assert_eq!(second.events(), first.events());
    }
}
