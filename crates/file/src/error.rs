use thiserror::Error;

/// Errors raised while locating, reading or writing delimited files.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Invalid file location: {0}")]
    InvalidLocation(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request for {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Malformed delimited data in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no header row")]
    MissingHeader(String),

    #[error("Record {index} has {found} fields, expected {expected}")]
    FieldCount {
        index: u64,
        expected: usize,
        found: usize,
    },

    #[error("Column '{column}' appears more than once in the header of {source_name}")]
    DuplicateHeader { column: String, source_name: String },
}

impl FileError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(source_name: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            source_name: source_name.into(),
            source,
        }
    }
}

impl From<FileError> for sync_core::TransferError {
    fn from(error: FileError) -> Self {
        match error {
            FileError::InvalidLocation(message) => {
                sync_core::TransferError::Request(sync_core::RequestError::new(message))
            }
            other => sync_core::TransferError::SourceRead(other.to_string()),
        }
    }
}
