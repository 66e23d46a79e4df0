//! Euroref Common Types
//!
//! This crate contains the value types shared by the euro reference rate
//! crates: the closed set of published currency codes, the currency/rate
//! pair, and identifiers used to correlate parse sessions in logs.

pub mod currency;
pub mod error;
pub mod identifiers;

pub use currency::*;
pub use error::*;
pub use identifiers::*;
