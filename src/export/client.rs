//! HTTP client for streaming export archives to disk.
//!
//! This module provides [`HttpClient`], created once per run and shared by
//! every export task so downloads reuse pooled connections.

use std::path::Path;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use super::constants::{CHUNK_SIZE, CONNECT_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::remote::Credentials;

/// Authenticated streaming downloader.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Credentials,
}

impl HttpClient {
    /// Creates a client whose requests each time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be set up.
    pub fn new(
        credentials: Credentials,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(concat!("space-export/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Downloads `url` into `path`, replacing any existing file.
    ///
    /// Returns the number of bytes written. A partial file is left behind on
    /// failure; the next attempt truncates it.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::HttpStatus`] for any status other than 200
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] for transport failures
    /// - [`DownloadError::Io`] if the file cannot be created or written
    /// - [`DownloadError::Incomplete`] if the body is shorter than its declared length
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn download(&self, url: &str, path: &Path) -> Result<u64, DownloadError> {
        debug!("starting download");
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.token))
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let expected = response.content_length().filter(|len| *len > 0);
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let url_owned = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url_owned.as_str(), e)));

        write_body(body, file, path, expected).await
    }
}

/// Streams `body` through an 8 KiB buffered writer into `file`.
///
/// When `expected` is known and the stream ends short of it, the result is
/// [`DownloadError::Incomplete`].
pub(crate) async fn write_body<S, B>(
    mut body: S,
    file: File,
    path: &Path,
    expected: Option<u64>,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, DownloadError>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut progress = expected.map(ProgressThreshold::new);
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let bytes = chunk.as_ref();
        writer
            .write_all(bytes)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        written += bytes.len() as u64;

        if let Some(percent) = progress.as_mut().and_then(|p| p.advance(written)) {
            debug!(percent, bytes = written, "download progress");
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    if let Some(expected) = expected
        && written < expected
    {
        return Err(DownloadError::incomplete(path, expected, written));
    }

    Ok(written)
}

/// Reports a percentage each time the transfer crosses into a new 10% band.
#[derive(Debug)]
struct ProgressThreshold {
    total: u64,
    last_band: u64,
}

impl ProgressThreshold {
    fn new(total: u64) -> Self {
        Self {
            total,
            last_band: 0,
        }
    }

    fn advance(&mut self, written: u64) -> Option<u64> {
        if self.total == 0 {
            return None;
        }
        let percent = written.saturating_mul(100) / self.total;
        let band = percent / 10;
        if band > self.last_band {
            self.last_band = band;
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::stream;
    use tempfile::TempDir;

    use super::*;

    fn chunks(sizes: &[usize]) -> impl Stream<Item = Result<Vec<u8>, DownloadError>> + Unpin {
        let items: Vec<Result<Vec<u8>, DownloadError>> =
            sizes.iter().map(|size| Ok(vec![7_u8; *size])).collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_write_body_short_stream_is_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DOCS_Docs.html.zip");
        let file = File::create(&path).await.unwrap();

        let result = write_body(chunks(&[250, 250]), file, &path, Some(1000)).await;

        match result {
            Err(DownloadError::Incomplete {
                expected_bytes,
                actual_bytes,
                ..
            }) => {
                assert_eq!(expected_bytes, 1000);
                assert_eq!(actual_bytes, 500);
            }
            other => panic!("expected incomplete error, got {other:?}"),
        }
        // partial file stays behind for the next attempt to truncate
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_write_body_complete_stream_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let file = File::create(&path).await.unwrap();

        let written = write_body(chunks(&[8192, 8192, 1616]), file, &path, Some(18_000))
            .await
            .unwrap();

        assert_eq!(written, 18_000);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 18_000);
    }

    #[tokio::test]
    async fn test_write_body_without_length_accepts_any_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let file = File::create(&path).await.unwrap();

        let written = write_body(chunks(&[3, 4]), file, &path, None).await.unwrap();
        assert_eq!(written, 7);
    }

    #[tokio::test]
    async fn test_write_body_propagates_stream_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let file = File::create(&path).await.unwrap();
        let body = stream::iter(vec![
            Ok(vec![1_u8; 10]),
            Err(DownloadError::timeout("https://wiki.example.com/x.zip")),
        ]);

        let result = write_body(body, file, &path, Some(100)).await;
        assert!(matches!(result, Err(DownloadError::Timeout { .. })));
    }

    #[test]
    fn test_progress_threshold_reports_band_crossings_only() {
        let mut progress = ProgressThreshold::new(1000);
        assert_eq!(progress.advance(50), None);
        assert_eq!(progress.advance(100), Some(10));
        assert_eq!(progress.advance(150), None);
        // jumping several bands reports once
        assert_eq!(progress.advance(470), Some(47));
        assert_eq!(progress.advance(480), None);
        assert_eq!(progress.advance(1000), Some(100));
        assert_eq!(progress.advance(1000), None);
    }

    #[test]
    fn test_progress_threshold_zero_total_is_silent() {
        let mut progress = ProgressThreshold::new(0);
        assert_eq!(progress.advance(10), None);
    }
}
