//! Human-readable currency amount parsing.
//!
//! Scheme servers accept prices like `"$1"`, `"0.025"`, or `"1,000.50"` in
//! route configuration and must turn them into exact minor-unit amounts.
//! [`MoneyAmount`] does the cleanup and precision bookkeeping.

use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// A parsed, non-negative monetary amount with preserved decimal precision.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(Decimal);

/// Errors that can occur when parsing a monetary amount.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    #[error("Invalid number format")]
    InvalidFormat,
    #[error(
        "Amount must be between {} and {}",
        constants::MIN_STR,
        constants::MAX_STR
    )]
    OutOfRange,
    #[error("Negative value is not allowed")]
    Negative,
    /// The input has more decimal places than the asset supports.
    #[error("Too big of a precision: {money} vs {asset} on asset")]
    WrongPrecision { money: u32, asset: u32 },
}

mod constants {
    use super::*;

    pub const MIN_STR: &str = "0.000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

static CLEANUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("valid regex"));

impl MoneyAmount {
    /// Parses a human-readable currency string.
    ///
    /// Currency symbols, thousand separators, and whitespace are stripped
    /// before parsing. The result must be non-negative and within range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = CLEANUP_RE.replace_all(input, "").to_string();
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        if parsed.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < *constants::MIN || parsed > *constants::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(MoneyAmount(parsed))
    }

    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value as an unsigned integer without the decimal point
    /// (`"12.34"` yields `1234`).
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }

    /// Converts to a minor-unit amount string for an asset with the given
    /// number of decimals (`"1.50"` with 2 decimals yields `"150"`).
    pub fn as_minor_units(&self, decimals: u32) -> Result<String, MoneyAmountParseError> {
        if self.scale() > decimals {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: self.scale(),
                asset: decimals,
            });
        }
        let scaled = self
            .0
            .checked_mul(Decimal::from(10u64.pow(decimals)))
            .ok_or(MoneyAmountParseError::OutOfRange)?;
        Ok(scaled.normalize().to_string())
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}
