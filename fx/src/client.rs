//! Fetch-and-parse entry points.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use euroref_common::CurrencyPair;

use crate::config::ClientConfig;
use crate::error::{FetchError, TransportError};
use crate::fetch::{ByteFetcher, HttpFetcher};
use crate::session::ParseSession;
use crate::source::XmlEventSource;

/// Trait for anything that can produce the euro reference pairs.
#[async_trait]
pub trait CurrencyPairProvider: Send + Sync {
    /// Error returned when no pairs can be produced.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the document at `url` and parse its currency pairs.
    async fn fetch_currency_pairs(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<CurrencyPair>, Self::Error>;
}

/// Fetches reference documents and parses them into currency pairs.
pub struct ReferenceRateClient<F> {
    fetcher: F,
    config: ClientConfig,
}

impl ReferenceRateClient<HttpFetcher> {
    /// Create an HTTP client from configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
        let fetcher = HttpFetcher::from_config(&config)?;
        Ok(Self::with_config(fetcher, config))
    }
}

impl<F: ByteFetcher> ReferenceRateClient<F> {
    /// Create a client with default configuration.
    pub fn new(fetcher: F) -> Self {
        Self::with_config(fetcher, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(fetcher: F, config: ClientConfig) -> Self {
        Self { fetcher, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch and parse the configured reference document.
    pub async fn fetch_latest(&self) -> Result<Vec<CurrencyPair>, FetchError<F::Error>> {
        self.fetch_currency_pairs(&self.config.reference_url, self.config.timeout)
            .await
    }

    /// Fetch the document at `url` and parse its currency pairs.
    ///
    /// Fetcher errors come back unchanged as [`FetchError::Transport`].
    #[instrument(skip(self))]
    pub async fn fetch_currency_pairs(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<CurrencyPair>, FetchError<F::Error>> {
        let bytes = match self.fetcher.fetch(url, timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to fetch reference document");
                return Err(FetchError::Transport(e));
            }
        };

        let session = ParseSession::new(XmlEventSource::new(bytes));
        let pairs = session.parse(timeout).await?;

        info!(pairs = pairs.len(), "Fetched currency pairs");
        Ok(pairs)
    }
}

#[async_trait]
impl<F: ByteFetcher> CurrencyPairProvider for ReferenceRateClient<F> {
    type Error = FetchError<F::Error>;

    async fn fetch_currency_pairs(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Vec<CurrencyPair>, Self::Error> {
        ReferenceRateClient::fetch_currency_pairs(self, url, timeout).await
    }
}
