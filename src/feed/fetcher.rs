use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Default ceiling on the response body.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default bound on the whole request, headers and body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while downloading the feed.
///
/// Every variant is a network-level failure from the caller's point of
/// view: the refresh fails and the parser never runs.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, body stream, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Limits applied to a single download.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: REQUEST_TIMEOUT,
            max_bytes: MAX_FEED_SIZE,
        }
    }
}

/// Byte counter for one download.
///
/// The fraction is only defined when the server announced a non-zero
/// Content-Length; it is clamped to 1.0 in case the body overruns the
/// header.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownloadProgress {
    received: u64,
    expected: Option<u64>,
}

impl DownloadProgress {
    pub fn new(expected: Option<u64>) -> Self {
        Self {
            received: 0,
            expected: expected.filter(|&len| len > 0),
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.received = self.received.saturating_add(bytes as u64);
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn expected(&self) -> Option<u64> {
        self.expected
    }

    pub fn fraction(&self) -> Option<f32> {
        self.expected
            .map(|expected| (self.received as f64 / expected as f64).min(1.0) as f32)
    }
}

/// Downloads the feed body with a single GET.
///
/// Bytes are accumulated into a buffer owned by this call, so every
/// invocation starts from an empty buffer and a fresh expected length.
/// `on_progress` is called after each received chunk with the fraction
/// downloaded so far, but only when the Content-Length is known; the values
/// never decrease and never leave `[0, 1]`.
///
/// There are no retries: a failure is returned to the caller as-is.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection, TLS or body stream errors
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::Timeout`] - Request exceeded `options.timeout`
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `options.max_bytes`
pub async fn fetch_feed<F>(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
    mut on_progress: F,
) -> Result<Vec<u8>, FetchError>
where
    F: FnMut(f32),
{
    tokio::time::timeout(
        options.timeout,
        download(client, url, options.max_bytes, &mut on_progress),
    )
    .await
    .map_err(|_| FetchError::Timeout)?
}

async fn download<F>(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
    on_progress: &mut F,
) -> Result<Vec<u8>, FetchError>
where
    F: FnMut(f32),
{
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    // Fast path: check Content-Length header
    let mut progress = DownloadProgress::new(response.content_length());
    if let Some(len) = progress.expected() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::with_capacity(progress.expected().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
        progress.record(chunk.len());
        if let Some(fraction) = progress.fraction() {
            on_progress(fraction);
        }
    }

    tracing::debug!(
        url = %url,
        received = progress.received(),
        expected = ?progress.expected(),
        "Feed download complete"
    );

    Ok(bytes)
}
