//! Euroref FX
//!
//! Fetches the euro foreign exchange reference rates and parses them into
//! [`CurrencyPair`]s.
//!
//! # Features
//!
//! - Push-based XML parsing bridged to a single awaited result
//! - Timeout racing with guaranteed single resolution
//! - Pluggable byte fetchers (HTTP, local files, in-memory stubs)
//!
//! # Example
//!
//! ```rust,ignore
//! use euroref_fx::{ClientConfig, ReferenceRateClient};
//!
//! let client = ReferenceRateClient::from_config(ClientConfig::from_env()?)?;
//! let pairs = client.fetch_latest().await?;
//!
//! assert_eq!(pairs[0], CurrencyPair::euro());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod session;
pub mod source;

#[cfg(test)]
mod testing;

pub use client::{CurrencyPairProvider, ReferenceRateClient};
pub use config::ClientConfig;
pub use error::{ConfigError, FetchError, ParseError, ParseResult, SourceError, TransportError};
pub use euroref_common::{CurrencyCode, CurrencyPair, SessionId};
pub use fetch::{ByteFetcher, FileFetcher, HttpFetcher};
#[cfg(any(test, feature = "test-utils"))]
pub use fetch::{StaticFetcher, StubError};
pub use session::{EventSink, Outcome, ParseSession, SessionPhase};
pub use source::{EventSource, StartElement, XmlEventSource};
