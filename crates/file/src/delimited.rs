//! Header-first delimited files: lazy reading and batch-appending writing.

use crate::{FileError, FileSource, DEFAULT_BUFFER_SIZE};
use csv_types::Delimiter;
use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use sync_core::{CoercionError, RawRecord};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// A record as read: its fields, or why they could not be decoded.
pub type DecodedRecord = Result<RawRecord, CoercionError>;

/// Lazy, forward-only reader over the records of a delimited file.
///
/// The header row is read on open. Records are parsed one at a time and
/// numbered from 0 in file order. Records are not required to match the
/// header width; that check belongs to whoever projects them onto columns.
/// A record that is not valid UTF-8 is returned as a [`CoercionError`] with
/// its index, and reading continues with the next one.
pub struct DelimitedReader {
    source_name: String,
    headers: Vec<String>,
    records: csv::ByteRecordsIntoIter<Box<dyn Read + Send>>,
    next_index: u64,
    remaining: Option<usize>,
}

impl DelimitedReader {
    /// Open `source` and read its header row.
    pub async fn open(source: &FileSource, delimiter: Delimiter) -> Result<Self, FileError> {
        let reader = source.open(DEFAULT_BUFFER_SIZE).await?;
        Self::from_reader(reader, delimiter, source.display_name())
    }

    /// Wrap an already opened reader. `source_name` is used in errors.
    pub fn from_reader(
        reader: Box<dyn Read + Send>,
        delimiter: Delimiter,
        source_name: impl Into<String>,
    ) -> Result<Self, FileError> {
        let source_name = source_name.into();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter.as_byte())
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| FileError::csv(&source_name, e))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() {
            return Err(FileError::MissingHeader(source_name));
        }
        let mut seen = HashSet::new();
        for column in &headers {
            if !seen.insert(column.as_str()) {
                return Err(FileError::DuplicateHeader {
                    column: column.clone(),
                    source_name,
                });
            }
        }

        debug!("Headers of {source_name}: {headers:?}");

        Ok(Self {
            source_name,
            headers,
            records: csv_reader.into_byte_records(),
            next_index: 0,
            remaining: None,
        })
    }

    /// Stop after at most `limit` records.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.remaining = Some(limit);
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Read up to `max` records. An empty batch means the file is exhausted.
    ///
    /// Undecodable records take their place in the batch as errors. A
    /// malformed file (I/O or parse failure) fails the whole call.
    pub fn read_batch(&mut self, max: usize) -> Result<Vec<DecodedRecord>, FileError> {
        let mut batch = Vec::with_capacity(max.min(DEFAULT_BATCH_HINT));
        while batch.len() < max {
            match self.next_decoded() {
                Some(record) => batch.push(record?),
                None => break,
            }
        }
        Ok(batch)
    }

    fn next_decoded(&mut self) -> Option<Result<DecodedRecord, FileError>> {
        if self.remaining == Some(0) {
            return None;
        }
        let result = self.records.next()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        let index = self.next_index;
        self.next_index += 1;

        Some(
            result
                .map(|record| decode_record(index, &record))
                .map_err(|e| FileError::csv(&self.source_name, e)),
        )
    }
}

fn decode_record(index: u64, record: &csv::ByteRecord) -> DecodedRecord {
    let fields = record
        .iter()
        .enumerate()
        .map(|(position, field)| {
            String::from_utf8(field.to_vec()).map_err(|_| {
                CoercionError::new(
                    index,
                    format!("Field {} is not valid UTF-8", position + 1),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawRecord::new(index, fields))
}

// Caps the up-front allocation of read_batch for very large batch sizes
const DEFAULT_BATCH_HINT: usize = 4096;

/// Decodable records only; undecodable ones are skipped with a warning.
impl Iterator for DelimitedReader {
    type Item = Result<RawRecord, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.next_decoded()? {
                Ok(Ok(record)) => return Some(Ok(record)),
                Ok(Err(error)) => warn!("Skipping record of {}: {error}", self.source_name),
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

/// Open `source` for lazy reading, stopping after `limit` records if given.
pub async fn read_delimited(
    source: &FileSource,
    delimiter: Delimiter,
    limit: Option<usize>,
) -> Result<DelimitedReader, FileError> {
    let reader = DelimitedReader::open(source, delimiter).await?;
    Ok(match limit {
        Some(limit) => reader.with_limit(limit),
        None => reader,
    })
}

/// Read the header and the first `sample_rows` records of `source`.
pub async fn read_delimited_sample(
    source: &FileSource,
    delimiter: Delimiter,
    sample_rows: usize,
) -> Result<(Vec<String>, Vec<RawRecord>), FileError> {
    let reader = read_delimited(source, delimiter, Some(sample_rows)).await?;
    let headers = reader.headers().to_vec();
    let records = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((headers, records))
}

/// Writes a header row, then appends batches of records.
///
/// Each batch is encoded in memory and appended with a single write, so a
/// batch either lands in the file or the call fails.
pub struct DelimitedWriter {
    path: PathBuf,
    delimiter: Delimiter,
    file: tokio::fs::File,
    width: usize,
    records_written: u64,
}

impl DelimitedWriter {
    /// Create (or truncate) the file at `path` and write the header row.
    pub async fn create(
        path: impl Into<PathBuf>,
        delimiter: Delimiter,
        headers: &[String],
    ) -> Result<Self, FileError> {
        let path = path.into();
        let path_name = path.display().to_string();
        if headers.is_empty() {
            return Err(FileError::MissingHeader(path_name));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FileError::io(parent.display().to_string(), e))?;
        }
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| FileError::io(&path_name, e))?;

        let mut writer = Self {
            path,
            delimiter,
            file,
            width: headers.len(),
            records_written: 0,
        };
        let encoded = writer.encode(std::iter::once(headers))?;
        writer.append(&encoded).await?;
        debug!("Created {path_name} with {} columns", headers.len());
        Ok(writer)
    }

    /// Append `records`. Every record must have one field per header.
    pub async fn write_batch(&mut self, records: &[RawRecord]) -> Result<(), FileError> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(bad) = records.iter().find(|r| r.len() != self.width) {
            return Err(FileError::FieldCount {
                index: bad.index,
                expected: self.width,
                found: bad.len(),
            });
        }
        let encoded = self.encode(records.iter().map(|r| r.fields.as_slice()))?;
        self.append(&encoded).await?;
        self.records_written += records.len() as u64;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush to disk and return the number of records written.
    pub async fn finish(self) -> Result<u64, FileError> {
        self.file
            .sync_all()
            .await
            .map_err(|e| FileError::io(self.path.display().to_string(), e))?;
        Ok(self.records_written)
    }

    fn encode<'a, I>(&self, records: I) -> Result<Vec<u8>, FileError>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let path_name = self.path.display().to_string();
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter.as_byte())
            .from_writer(Vec::new());
        for fields in records {
            csv_writer
                .write_record(fields)
                .map_err(|e| FileError::csv(&path_name, e))?;
        }
        csv_writer
            .into_inner()
            .map_err(|e| FileError::io(path_name, e.into_error()))
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<(), FileError> {
        let path_name = || self.path.display().to_string();
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| FileError::io(path_name(), e))?;
        self.file
            .flush()
            .await
            .map_err(|e| FileError::io(path_name(), e))
    }
}
