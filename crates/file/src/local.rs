//! Local filesystem file reader implementation

use crate::FileError;
use std::io::BufReader;
use std::path::PathBuf;

/// Reads a local file with configurable buffering
pub struct LocalFileReader;

impl LocalFileReader {
    /// Open a local file and return a buffered, sync-compatible reader
    ///
    /// The file is read incrementally, `buffer_size` bytes at a time, so
    /// memory use does not grow with the file.
    ///
    /// # Example
    /// ```ignore
    /// let reader = LocalFileReader::open(
    ///     PathBuf::from("data.csv"),
    ///     1024 * 1024, // 1MB buffer
    /// ).await?;
    /// ```
    pub async fn open(
        path: PathBuf,
        buffer_size: usize,
    ) -> Result<Box<dyn std::io::Read + Send>, FileError> {
        let path_name = path.display().to_string();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| FileError::io(&path_name, e))?;
        if !metadata.is_file() {
            return Err(FileError::InvalidLocation(format!("{path_name} is not a file")));
        }

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| FileError::io(&path_name, e))?
            .into_std()
            .await;

        tracing::debug!("Opened {} ({} bytes)", path_name, metadata.len());
        Ok(Box::new(BufReader::with_capacity(buffer_size.max(1), file)))
    }
}
