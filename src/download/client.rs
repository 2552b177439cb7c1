//! HTTP client wrapper for pages, playlists, and segment bodies.
//!
//! This module provides the `HttpClient` struct which handles text fetches
//! with an explicit metadata timeout and cancellable streaming downloads.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, METADATA_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client shared by the resolver, the catalog, and the segment pool.
///
/// This client is designed to be created once and cloned freely, taking
/// advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use vodgrab_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let page = client.fetch_text("https://example.com/play/1-1-1.html").await?;
/// println!("{} bytes of HTML", page.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    metadata_timeout: Duration,
}

/// How a streaming download ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The whole body was written and flushed.
    Completed {
        /// Number of bytes written.
        bytes: u64,
    },
    /// The cancellation token fired before the body was complete.
    Cancelled,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (segment bodies)
    /// - Metadata timeout: 10 seconds (pages and playlists)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit connect/read timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            metadata_timeout: Duration::from_secs(METADATA_TIMEOUT_SECS),
        }
    }

    /// Overrides the timeout applied to page and playlist fetches.
    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Fetches a small text document (HTML page or playlist).
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails or
    /// times out, the server answers with a non-success status, or the body
    /// cannot be read.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .send(self.client.get(url).timeout(self.metadata_timeout), url)
            .await?;
        let body = response.text().await.map_err(|e| map_reqwest(url, e))?;
        debug!(bytes = body.len(), "fetched text");
        Ok(body)
    }

    /// Streams a response body into `path`, truncating any previous content.
    ///
    /// The cancellation token is polled before every chunk. `on_chunk` is
    /// called with the size of each chunk after it has been written.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on request, status, or write failures. The
    /// partially written file is left in place; the caller decides whether to
    /// remove it.
    pub async fn stream_to_file<F>(
        &self,
        url: &str,
        path: &Path,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<StreamOutcome, DownloadError>
    where
        F: FnMut(usize) + Send,
    {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = self.send(self.client.get(url), url) => response?,
        };

        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk_result) = next else {
                break;
            };
            let chunk = chunk_result.map_err(|e| map_reqwest(url, e))?;
            if chunk.is_empty() {
                continue;
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;

            bytes_written += chunk.len() as u64;
            on_chunk(chunk.len());
        }

        // Ensure all data is flushed to disk before the caller records completion
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        Ok(StreamOutcome::Completed {
            bytes: bytes_written,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, DownloadError> {
        let response = request.send().await.map_err(|e| map_reqwest(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn map_reqwest(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}
