use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::{parse_feed, FeedDocument};
use crate::shutdown::Shutdown;

/// User-Agent sent with every feed request unless configured otherwise
pub const DEFAULT_USER_AGENT: &str = "gator";
/// Total time budget for one request, headers through body
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving one feed document.
///
/// Everything except [`FetchError::Parse`] is a transport problem; `Parse`
/// means the server answered but the body was not a usable RSS document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Shutdown was requested while the request was in flight
    #[error("Request cancelled by shutdown")]
    Cancelled,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body could not be decoded as an RSS document
    #[error("Parse error: {0}")]
    Parse(String),
}

/// HTTP client for RSS documents.
///
/// One GET per call, no retries. Retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    /// Build a fetcher that identifies itself as `user_agent` and gives up
    /// after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Fetch and decode the RSS document at `url`.
    ///
    /// The request is raced against `shutdown`; a shutdown signal aborts it
    /// with [`FetchError::Cancelled`]. Non-2xx responses fail with
    /// [`FetchError::HttpStatus`] without reading the body.
    pub async fn fetch(&self, url: &str, shutdown: &Shutdown) -> Result<FeedDocument, FetchError> {
        let mut shutdown = shutdown.clone();
        let bytes = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(FetchError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.fetch_bytes(url)) => {
                result.map_err(|_| FetchError::Timeout(self.timeout))??
            }
        };

        let doc = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(url = %url, entries = doc.entries.len(), "Feed document decoded");
        Ok(doc)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
