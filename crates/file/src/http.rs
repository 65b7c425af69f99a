//! HTTP/HTTPS file reader implementation

use crate::FileError;

/// Reads a file from HTTP/HTTPS
pub struct HttpFileReader;

impl HttpFileReader {
    /// Open an HTTP/HTTPS URL and return a sync-compatible reader
    ///
    /// The whole response body is fetched before parsing starts, which keeps
    /// the sync `csv` reader off the async runtime.
    pub async fn open(
        url: String,
        _buffer_size: usize,
    ) -> Result<Box<dyn std::io::Read + Send>, FileError> {
        let http_error = |message: String| FileError::Http {
            url: url.clone(),
            message,
        };

        let client = reqwest::Client::new();
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| http_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(format!("status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| http_error(format!("failed to read response body: {e}")))?;

        tracing::debug!("Fetched {} bytes from: {}", bytes.len(), url);

        Ok(Box::new(std::io::Cursor::new(bytes)))
    }
}
