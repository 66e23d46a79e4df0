//! Error types for fetching and parsing euro reference rates.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by an event source while tokenizing a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {position})")]
pub struct SourceError {
    /// What the tokenizer rejected.
    pub message: String,
    /// Byte offset in the document where the failure was detected.
    pub position: u64,
}

impl SourceError {
    /// Create a new source error.
    pub fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// Errors produced by a parse session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document did not finish before the timeout elapsed.
    #[error("Parsing did not complete before the timeout")]
    Timeout,

    /// The event source reported a malformed document.
    #[error("Parsing failed: {0}")]
    Parsing(#[source] SourceError),
}

impl ParseError {
    /// Check if the session lost the race against its timer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ParseError::Timeout)
    }
}

/// Result type for parse sessions.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors returned by the fetch-and-parse entry points.
///
/// Transport failures carry the fetcher's own error untouched.
#[derive(Debug, Error)]
pub enum FetchError<E> {
    /// The byte fetcher failed.
    #[error("Transport failure: {0}")]
    Transport(#[source] E),

    /// The fetched document could not be parsed in time.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl<E> FetchError<E> {
    /// Get the transport error, if that is what failed.
    pub fn as_transport(&self) -> Option<&E> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Parse(_) => None,
        }
    }
}

/// Errors raised by the bundled byte fetchers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body not read.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    /// A local document could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The fetch did not complete in time.
    #[error("Fetching {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl TransportError {
    /// Check if a caller could reasonably try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(e) => e.is_timeout() || e.is_connect(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Io { .. } => false,
            TransportError::Timeout { .. } => true,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Reference URL cannot be empty")]
    EmptyUrl,

    #[error("Timeout cannot be zero")]
    ZeroTimeout,

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}
