//! Currency codes and currency/rate pairs quoted against the euro.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

macro_rules! currency_codes {
    ($($(#[$meta:meta])* $variant:ident => $code:literal,)+) => {
        /// ISO 4217 code of a currency quoted in the euro reference rates.
        ///
        /// The set is closed: it holds the currencies the reference publishes
        /// today plus those it has published in the past. Anything else is
        /// rejected by [`CurrencyCode::from_str`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum CurrencyCode {
            $(
                $(#[$meta])*
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl CurrencyCode {
            /// Every accepted code, euro first.
            pub const ALL: &'static [CurrencyCode] = &[$(CurrencyCode::$variant,)+];

            /// Get the three-letter code.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(CurrencyCode::$variant => $code,)+
                }
            }
        }

        impl FromStr for CurrencyCode {
            type Err = CommonError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(CurrencyCode::$variant),)+
                    other => Err(CommonError::UnknownCurrency(other.to_string())),
                }
            }
        }
    };
}

currency_codes! {
    /// The reference currency. Never appears in the document itself.
    Euro => "EUR",
    UsDollar => "USD",
    JapaneseYen => "JPY",
    BulgarianLev => "BGN",
    /// Withdrawn 2008.
    CyprusPound => "CYP",
    CzechKoruna => "CZK",
    DanishKrone => "DKK",
    /// Withdrawn 2011.
    EstonianKroon => "EEK",
    PoundSterling => "GBP",
    HungarianForint => "HUF",
    /// Withdrawn 2015.
    LithuanianLitas => "LTL",
    /// Withdrawn 2014.
    LatvianLats => "LVL",
    /// Withdrawn 2008.
    MalteseLira => "MTL",
    PolishZloty => "PLN",
    /// Redenominated 2005.
    RomanianLeuOld => "ROL",
    RomanianLeu => "RON",
    SwedishKrona => "SEK",
    /// Withdrawn 2007.
    SlovenianTolar => "SIT",
    /// Withdrawn 2009.
    SlovakKoruna => "SKK",
    SwissFranc => "CHF",
    IcelandicKrona => "ISK",
    NorwegianKrone => "NOK",
    /// Withdrawn 2023.
    CroatianKuna => "HRK",
    /// Suspended 2022.
    RussianRouble => "RUB",
    /// Redenominated 2005.
    TurkishLiraOld => "TRL",
    TurkishLira => "TRY",
    AustralianDollar => "AUD",
    BrazilianReal => "BRL",
    CanadianDollar => "CAD",
    ChineseYuan => "CNY",
    HongKongDollar => "HKD",
    IndonesianRupiah => "IDR",
    IsraeliShekel => "ILS",
    IndianRupee => "INR",
    SouthKoreanWon => "KRW",
    MexicanPeso => "MXN",
    MalaysianRinggit => "MYR",
    NewZealandDollar => "NZD",
    PhilippinePeso => "PHP",
    SingaporeDollar => "SGD",
    ThaiBaht => "THB",
    SouthAfricanRand => "ZAR",
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CurrencyCode {
    type Error = CommonError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// The quotation of one euro in units of another currency.
///
/// The rate is kept exactly as published; no format validation happens here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    code: CurrencyCode,
    rate: String,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(code: CurrencyCode, rate: impl Into<String>) -> Self {
        Self {
            code,
            rate: rate.into(),
        }
    }

    /// The euro against itself, which leads every parsed list.
    pub fn euro() -> Self {
        Self::new(CurrencyCode::Euro, "1.00")
    }

    /// Get the currency code.
    pub fn code(&self) -> CurrencyCode {
        self.code
    }

    /// Get the rate as published.
    pub fn rate(&self) -> &str {
        &self.rate
    }

    /// Parse the published rate as a decimal.
    pub fn rate_decimal(&self) -> Result<Decimal, CommonError> {
        Decimal::from_str(self.rate.trim()).map_err(|_| CommonError::InvalidRate {
            code: self.code.to_string(),
            rate: self.rate.clone(),
        })
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EUR/{} {}", self.code, self.rate)
    }
}
