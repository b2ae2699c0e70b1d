use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::fetcher::FetchError;

const MAX_REDIRECTS: usize = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("feedsync/", env!("CARGO_PKG_VERSION"));

/// Source of raw feed bytes.
///
/// The engine only ever asks for "the bytes behind this URL"; how they are
/// obtained (plain HTTP, a read-through proxy, canned test data) is up to
/// the implementation. Implementations must not retry and must not touch
/// engine state.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (**self).get(url).await
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Plain HTTP(S) transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_body_size: usize,
}

impl HttpTransport {
    /// Builds a client with the crate's user agent and redirect policy.
    pub fn new(max_body_size: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, max_body_size))
    }

    /// Uses a caller-configured client.
    pub fn with_client(client: reqwest::Client, max_body_size: usize) -> Self {
        Self {
            client,
            max_body_size,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.max_body_size).await
    }
}

/// Redirects are followed at most three hops and never in a loop.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );
        attempt.follow()
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

// ============================================================================
// Read-through proxy
// ============================================================================

/// Routes every request through a read-through proxy that takes the target
/// address in a `url` query parameter and answers with the raw body, e.g.
/// `https://allorigins.hexlet.app/raw?disableCache=true`.
#[derive(Debug, Clone)]
pub struct ProxyTransport<T> {
    inner: T,
    base: Url,
}

impl<T: Transport> ProxyTransport<T> {
    pub fn new(inner: T, base: Url) -> Self {
        Self { inner, base }
    }

    /// The address actually requested for `url`. Query parameters already
    /// present on the proxy base are kept.
    pub fn proxied_url(&self, url: &str) -> Url {
        let mut proxied = self.base.clone();
        proxied.query_pairs_mut().append_pair("url", url);
        proxied
    }
}

#[async_trait]
impl<T: Transport> Transport for ProxyTransport<T> {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let proxied = self.proxied_url(url);
        tracing::trace!(feed = %url, via = %proxied, "Fetching through proxy");
        self.inner.get(proxied.as_str()).await
    }
}
