//! Row sources over delimited files and store query results.

use crate::engine::RowSource;
use clickhouse_sink::{CompactRow, StoreRowStream};
use csv_types::{project_record, to_row};
use flatfile_sync_file::{DecodedRecord, DelimitedReader};
use sync_core::{CoercionError, ColumnDescriptor, Row, SchemaError, TransferError};

/// Reads the selected columns of a delimited file.
///
/// Parsing is synchronous, so each batch is read on the blocking pool. The
/// reader is moved there and back; it is gone after a read was abandoned.
pub struct FileRowSource {
    reader: Option<DelimitedReader>,
    /// Header position of each column in `columns`
    positions: Vec<usize>,
    width: usize,
    columns: Vec<ColumnDescriptor>,
}

impl FileRowSource {
    /// `columns` may be any subset of the file header, in any order.
    pub fn new(
        reader: DelimitedReader,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self, SchemaError> {
        let headers = reader.headers();
        let positions = columns
            .iter()
            .map(|column| {
                headers
                    .iter()
                    .position(|h| *h == column.name)
                    .ok_or_else(|| SchemaError::ColumnNotFound {
                        column: column.name.clone(),
                        context: format!("the header of {}", reader.source_name()),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            width: headers.len(),
            reader: Some(reader),
            positions,
            columns,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }
}

#[async_trait::async_trait]
impl RowSource for FileRowSource {
    type Record = DecodedRecord;

    async fn next_batch(&mut self, max: usize) -> Result<Vec<DecodedRecord>, TransferError> {
        let mut reader = self.reader.take().ok_or_else(|| {
            TransferError::SourceRead("File reader was lost by an interrupted read".into())
        })?;
        let (reader, batch) = tokio::task::spawn_blocking(move || {
            let batch = reader.read_batch(max);
            (reader, batch)
        })
        .await
        .map_err(|e| TransferError::SourceRead(format!("File read task failed: {e}")))?;
        self.reader = Some(reader);
        Ok(batch?)
    }

    fn transcode(&self, record: DecodedRecord) -> Result<Row, CoercionError> {
        let projected = project_record(record?, &self.positions, self.width)?;
        to_row(&projected, &self.columns)
    }
}

/// Reads the rows of a store query result.
pub struct StoreRowSource {
    stream: StoreRowStream,
    columns: Vec<ColumnDescriptor>,
}

impl StoreRowSource {
    pub fn new(stream: StoreRowStream) -> Self {
        let columns = stream.columns().to_vec();
        Self { stream, columns }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }
}

#[async_trait::async_trait]
impl RowSource for StoreRowSource {
    type Record = CompactRow;

    async fn next_batch(&mut self, max: usize) -> Result<Vec<CompactRow>, TransferError> {
        self.stream.read_batch(max).await
    }

    fn transcode(&self, record: CompactRow) -> Result<Row, CoercionError> {
        record.into_row(&self.columns)
    }
}
