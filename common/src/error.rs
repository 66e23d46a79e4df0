//! Error types for euro reference value types.

use thiserror::Error;

/// Errors raised while building euro reference values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// The code is not one of the currencies quoted against the euro.
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// The rate string is not a decimal number.
    #[error("Invalid rate {rate:?} for {code}")]
    InvalidRate { code: String, rate: String },
}
