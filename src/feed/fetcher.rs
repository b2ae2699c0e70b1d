use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::transport::Transport;

/// Errors that can occur while retrieving feed bytes.
///
/// Every variant is a network-level failure from the engine's point of
/// view: the feed is skipped for the current pass and tried again on the
/// next one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The transport did not answer within the fetch timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large (limit {0} bytes)")]
    ResponseTooLarge(usize),
    /// Any other transport failure (proxy refusal, test doubles, ...)
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Retrieves raw feed bytes through an injected [`Transport`].
///
/// The fetcher adds exactly one policy on top of the transport: every call
/// is bounded by `timeout`, so a single unreachable feed cannot hold up the
/// join at the end of a pass. It never retries; the next pass is the retry.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url`, failing with [`FetchError::Timeout`] once the timeout
    /// elapses.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.transport.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        match &result {
            Ok(bytes) => tracing::debug!(
                feed = %url,
                bytes = bytes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetched feed"
            ),
            Err(e) => tracing::warn!(feed = %url, error = %e, "Feed fetch failed"),
        }

        result
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl Transport for Fixed {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    struct Hangs;

    #[async_trait]
    impl Transport for Hangs {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            std::future::pending().await
        }
    }

    struct Refuses;

    #[async_trait]
    impl Transport for Refuses {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::HttpStatus(502))
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_transport_bytes() {
        let fetcher = Fetcher::new(Arc::new(Fixed("<rss/>")), Duration::from_secs(1));
        let bytes = fetcher.fetch("https://example.com/feed.xml").await.unwrap();
        assert_eq!(bytes, b"<rss/>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_times_out() {
        let fetcher = Fetcher::new(Arc::new(Hangs), Duration::from_secs(10));
        let result = fetcher.fetch("https://example.com/slow.xml").await;
        match result {
            Err(FetchError::Timeout(d)) => assert_eq!(d, Duration::from_secs(10)),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_passes_errors_through_without_retry() {
        let fetcher = Fetcher::new(Arc::new(Refuses), Duration::from_secs(1));
        let result = fetcher.fetch("https://example.com/feed.xml").await;
        assert!(matches!(result, Err(FetchError::HttpStatus(502))));
    }
}
