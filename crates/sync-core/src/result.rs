//! Transfer outcome, accumulated batch by batch.

use crate::error::{CoercionError, ErrorDescriptor};
use serde::{Deserialize, Serialize};

/// Upper bound on row rejections kept in a [`TransferResult`]. Rejections past
/// this are only counted.
pub const MAX_RECORDED_REJECTIONS: usize = 100;

/// Outcome of one transfer invocation.
///
/// Returned exactly once per transfer, also when the transfer aborted, so the
/// caller always learns how many rows made it before the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Column projection the rows were written with, in order
    pub columns: Vec<String>,

    /// Rows written by successful batches
    pub rows_transferred: u64,

    /// Rows dropped by the transcoder
    pub rows_rejected: u64,

    pub batches_attempted: usize,
    pub batches_succeeded: usize,

    /// First transfer-level failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<ErrorDescriptor>,

    /// The first [`MAX_RECORDED_REJECTIONS`] row rejections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<CoercionError>,

    /// Set when the transfer stopped on a cancellation request
    #[serde(default)]
    pub cancelled: bool,
}

impl TransferResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Count a row rejection, keeping its details while under the bound.
    pub fn record_rejection(&mut self, error: CoercionError) {
        self.rows_rejected += 1;
        if self.rejections.len() < MAX_RECORDED_REJECTIONS {
            self.rejections.push(error);
        }
    }

    /// Record a transfer-level error. Only the first one is kept.
    pub fn record_error(&mut self, error: ErrorDescriptor) {
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    /// No transfer-level error, every attempted batch written, not cancelled.
    ///
    /// Row rejections alone do not make a transfer unsuccessful.
    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
            && !self.cancelled
            && self.batches_attempted == self.batches_succeeded
    }
}
