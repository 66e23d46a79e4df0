//! Byte fetchers that supply reference documents.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::TransportError;

/// Trait for anything that can load a document's raw bytes.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Error returned when the bytes cannot be obtained.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the document at `url`, giving up after roughly `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Self::Error>;
}

/// Fetches documents over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default user agent.
    pub fn new() -> Result<Self, TransportError> {
        Self::from_config(&ClientConfig::default())
    }

    /// Create a fetcher from client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    type Error = TransportError;

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "Reference document request rejected");
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), "Fetched reference document");
        Ok(bytes.to_vec())
    }
}

/// Reads documents from the local filesystem.
///
/// Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

#[async_trait]
impl ByteFetcher for FileFetcher {
    type Error = TransportError;

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let path = url.strip_prefix("file://").unwrap_or(url);

        let bytes = tokio::time::timeout(timeout, tokio::fs::read(path))
            .await
            .map_err(|_| TransportError::Timeout {
                url: url.to_string(),
                timeout,
            })?
            .map_err(|source| TransportError::Io {
                path: path.to_string(),
                source,
            })?;

        debug!(path, bytes = bytes.len(), "Read reference document");
        Ok(bytes)
    }
}

/// Error returned by [`StaticFetcher`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StubError(pub String);

/// In-memory fetcher for tests. Unknown URLs fail with a [`StubError`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct StaticFetcher {
    stubs: dashmap::DashMap<String, Result<Vec<u8>, StubError>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`.
    pub fn stub_bytes(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.stubs.insert(url.into(), Ok(bytes.into()));
    }

    /// Fail requests for `url` with `error`.
    pub fn stub_error(&self, url: impl Into<String>, error: StubError) {
        self.stubs.insert(url.into(), Err(error));
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ByteFetcher for StaticFetcher {
    type Error = StubError;

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, StubError> {
        self.stubs
            .get(url)
            .map(|stub| stub.clone())
            .unwrap_or_else(|| Err(StubError(format!("no stub for {url}"))))
    }
}
