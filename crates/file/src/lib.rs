//! Delimited file access for reading from the local filesystem or HTTP/HTTPS
//! and writing to the local filesystem.
//!
//! # Source Types
//!
//! - **Local**: A single file on the local filesystem
//! - **HTTP/HTTPS**: A single URL, fetched in full before parsing
//!
//! Files are read lazily record by record through [`DelimitedReader`] and
//! written batch by batch through [`DelimitedWriter`]. The first line is
//! always a header row.
//!
//! # Example
//!
//! ```ignore
//! use csv_types::Delimiter;
//! use flatfile_sync_file::{DelimitedReader, FileSource};
//!
//! let source = FileSource::parse("/data/users.csv")?;
//! let mut reader = DelimitedReader::open(&source, Delimiter::Comma).await?;
//! let batch = reader.read_batch(1000)?;
//! ```

mod delimited;
mod error;
mod http;
mod local;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use delimited::{
    read_delimited, read_delimited_sample, DecodedRecord, DelimitedReader, DelimitedWriter,
};
pub use error::FileError;
pub use http::HttpFileReader;
pub use local::LocalFileReader;

/// Default buffer size for reading operations (1MB)
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Location of a delimited file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Local filesystem path
    Local(PathBuf),
    /// HTTP/HTTPS URL (read-only)
    Http(String),
}

impl FileSource {
    /// Parse a string into a FileSource, auto-detecting the source type
    ///
    /// - `http://` or `https://` -> Http
    /// - Everything else -> Local
    pub fn parse(uri: &str) -> Result<Self, FileError> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(FileError::InvalidLocation(
                "file location must not be empty".to_string(),
            ));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(FileSource::Http(trimmed.to_string()))
        } else if trimmed.ends_with('/') || trimmed.ends_with(std::path::MAIN_SEPARATOR) {
            Err(FileError::InvalidLocation(format!(
                "'{trimmed}' names a directory, expected a file"
            )))
        } else {
            Ok(FileSource::Local(PathBuf::from(trimmed)))
        }
    }

    /// Whether a transfer may write to this location.
    pub fn is_writable(&self) -> bool {
        matches!(self, FileSource::Local(_))
    }

    /// Open this source and return a reader
    pub async fn open(&self, buffer_size: usize) -> Result<Box<dyn std::io::Read + Send>, FileError> {
        match self {
            FileSource::Local(path) => LocalFileReader::open(path.clone(), buffer_size).await,
            FileSource::Http(url) => HttpFileReader::open(url.clone(), buffer_size).await,
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            FileSource::Local(path) => path.display().to_string(),
            FileSource::Http(url) => url.clone(),
        }
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl FromStr for FileSource {
    type Err = FileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
