//! Transfers described in a YAML file.
//!
//! ```yaml
//! source:
//!   file:
//!     location: data/events.csv
//!     delimiter: tab
//! destination:
//!   store:
//!     table: events
//! columns: [id, name]
//! create_table: true
//! failure_mode: best_effort
//! timeout: 5m
//! ```

use super::parse_duration;
use anyhow::Context;
use flatfile_sync_transfer::{
    DestinationDescriptor, FailureMode, SourceDescriptor, TransferRequest, DEFAULT_BATCH_SIZE,
};
use serde::Deserialize;
use std::path::Path;
use sync_core::ColumnSelection;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferFile {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: SourceDescriptor,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub destination: DestinationDescriptor,
    #[serde(default)]
    pub columns: ColumnSelection,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub create_table: bool,
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Same syntax as `--timeout`
    #[serde(default)]
    pub timeout: Option<String>,
}

impl TransferFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transfer file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse transfer file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn into_request(self) -> anyhow::Result<TransferRequest> {
        let mut request = TransferRequest::new(self.source, self.destination);
        request.selected_columns = self.columns;
        request.batch_size = self.batch_size;
        request.create_destination_if_absent = self.create_table;
        request.failure_mode = self.failure_mode;
        if let Some(timeout) = &self.timeout {
            request.io_timeout = parse_duration(timeout)?;
        }
        Ok(request)
    }
}
