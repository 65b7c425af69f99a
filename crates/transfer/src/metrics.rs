//! Throughput metrics for transfers, written as JSON lines.

use crate::events::{TransferEvent, TransferObserver};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// Counts rows and batches as the engine reports them and periodically
/// appends a snapshot to `output_path`.
#[derive(Clone)]
pub struct MetricsCollector {
    rows_transferred: Arc<AtomicU64>,
    rows_rejected: Arc<AtomicU64>,
    batches_written: Arc<AtomicU64>,
    start_time: Instant,
    output_path: PathBuf,
}

/// Single metrics entry (one JSON line)
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsEntry {
    pub timestamp: String,
    pub rows_transferred: u64,
    pub rows_rejected: u64,
    pub batches_written: u64,
    pub throughput_rows_per_sec: f64,
    pub memory_mb: u64,
    pub elapsed_secs: f64,
}

impl MetricsCollector {
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            rows_transferred: Arc::new(AtomicU64::new(0)),
            rows_rejected: Arc::new(AtomicU64::new(0)),
            batches_written: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            output_path,
        }
    }

    pub fn add_rows(&self, count: u64) {
        self.rows_transferred.fetch_add(count, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rejected(&self, count: u64) {
        self.rows_rejected.fetch_add(count, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsEntry {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rows = self.rows_transferred.load(Ordering::Relaxed);

        let throughput_rows = if elapsed > 0.0 {
            rows as f64 / elapsed
        } else {
            0.0
        };

        MetricsEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            rows_transferred: rows,
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            throughput_rows_per_sec: throughput_rows,
            memory_mb: resident_memory_mb(),
            elapsed_secs: elapsed,
        }
    }

    /// Append one snapshot to the output file.
    pub async fn emit_snapshot(&self) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await?;
        self.write_snapshot(&mut file).await
    }

    async fn write_snapshot(&self, file: &mut tokio::fs::File) -> io::Result<()> {
        let json_line = serde_json::to_string(&self.snapshot()).map_err(io::Error::other)?;
        file.write_all(json_line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }

    /// Start background metrics emission. Abort the handle when the
    /// transfer is over.
    pub fn start_emission_task(&self, interval: Duration) -> tokio::task::JoinHandle<io::Result<()>> {
        let collector = self.clone();

        tokio::spawn(async move {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&collector.output_path)
                .await?;

            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                collector.write_snapshot(&mut file).await?;
            }
        })
    }
}

impl TransferObserver for MetricsCollector {
    fn on_event(&self, event: &TransferEvent<'_>) {
        match event {
            TransferEvent::BatchFinished { rows, .. } => self.add_rows(*rows as u64),
            TransferEvent::RowRejected { .. } => self.add_rejected(1),
            _ => {}
        }
    }
}

/// Resident set size from /proc/self/status; 0 where unavailable.
fn resident_memory_mb() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|content| {
            content
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| {
                    line.split_whitespace()
                        .nth(1)
                        .and_then(|kb| kb.parse::<u64>().ok())
                        .map(|kb| kb / 1024)
                })
        })
        .unwrap_or(0)
}
