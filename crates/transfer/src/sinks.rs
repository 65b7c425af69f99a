//! Batch sinks writing into a store table or a delimited file.

use crate::engine::BatchSink;
use clickhouse_sink::StoreAdapter;
use csv_types::from_row;
use flatfile_sync_file::DelimitedWriter;
use sync_core::{ColumnDescriptor, Row, TransferError};
use tracing::debug;

/// Inserts each batch into one table.
pub struct StoreSink<'a, A: StoreAdapter + ?Sized> {
    store: &'a A,
    table: String,
    columns: Vec<ColumnDescriptor>,
}

impl<'a, A: StoreAdapter + ?Sized> StoreSink<'a, A> {
    pub fn new(store: &'a A, table: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            store,
            table: table.into(),
            columns,
        }
    }
}

#[async_trait::async_trait]
impl<'a, A: StoreAdapter + ?Sized> BatchSink for StoreSink<'a, A> {
    async fn write_batch(&mut self, rows: &[Row]) -> Result<(), TransferError> {
        self.store.insert_batch(&self.table, &self.columns, rows).await
    }
}

/// Appends each batch to a delimited file.
pub struct FileSink {
    writer: Option<DelimitedWriter>,
    columns: Vec<ColumnDescriptor>,
}

impl FileSink {
    /// `writer` must have been created with the names of `columns` as header.
    pub fn new(writer: DelimitedWriter, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            writer: Some(writer),
            columns,
        }
    }
}

fn write_error(error: flatfile_sync_file::FileError) -> TransferError {
    TransferError::BatchWrite(error.to_string())
}

#[async_trait::async_trait]
impl BatchSink for FileSink {
    async fn write_batch(&mut self, rows: &[Row]) -> Result<(), TransferError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransferError::BatchWrite("File sink already finished".into()))?;
        let records = rows
            .iter()
            .map(|row| from_row(row, &self.columns))
            .collect::<Result<Vec<_>, _>>()?;
        writer.write_batch(&records).await.map_err(write_error)
    }

    async fn finish(&mut self) -> Result<(), TransferError> {
        if let Some(writer) = self.writer.take() {
            let path = writer.path().display().to_string();
            let written = writer.finish().await.map_err(write_error)?;
            debug!("Wrote {written} records to {path}");
        }
        Ok(())
    }
}
