//! Client configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// The ECB's daily euro foreign exchange reference rates.
pub const DEFAULT_REFERENCE_URL: &str =
    "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// Configuration for the reference rate client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Document fetched by `fetch_latest`.
    pub reference_url: String,
    /// Budget for the fetch, and separately for the parse.
    pub timeout: Duration,
    /// User agent sent by the HTTP fetcher.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reference_url: DEFAULT_REFERENCE_URL.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: concat!("euroref/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("EUROREF_URL") {
            config.reference_url = url;
        }

        if let Ok(timeout) = std::env::var("EUROREF_TIMEOUT_MS") {
            let millis = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "EUROREF_TIMEOUT_MS".to_string(),
                value: timeout.clone(),
            })?;
            config.timeout = Duration::from_millis(millis);
        }

        if let Ok(agent) = std::env::var("EUROREF_USER_AGENT") {
            config.user_agent = agent;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the reference URL.
    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = url.into();
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}
