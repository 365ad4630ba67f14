//! Charge amounts and currency codes.
//!
//! Amounts always travel as integer minor units (cents for `usd`). Text typed
//! by an operator is converted with exact decimal arithmetic; never route a
//! price through `f64`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TerminalError};

/// Currencies whose smallest unit is the major unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Lowercase ISO 4217 currency code.
///
/// # Example
///
/// ```
/// use payonphone_lib::Currency;
///
/// let currency = Currency::new("USD").unwrap();
/// assert_eq!(currency.as_str(), "usd");
/// assert_eq!(currency.exponent(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Well-known code for US dollars, the default charge currency.
    pub const USD: &'static str = "usd";

    /// Validate and normalize a currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref().trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(TerminalError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    /// US dollars.
    pub fn usd() -> Self {
        Self(Self::USD.to_string())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of fractional digits in the major unit.
    pub fn exponent(&self) -> u32 {
        if ZERO_DECIMAL_CURRENCIES.contains(&self.0.as_str()) {
            0
        } else {
            2
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl FromStr for Currency {
    type Err = TerminalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = TerminalError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A positive charge amount in minor currency units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    /// Create from minor units. Zero is rejected.
    pub fn from_minor(minor_units: u64) -> Result<Self> {
        if minor_units == 0 {
            return Err(TerminalError::invalid_amount("0", "amount must be positive"));
        }
        Ok(Self(minor_units))
    }

    /// Parse operator input in major units ("15.99") into minor units.
    ///
    /// Inputs with more fractional digits than the currency allows are
    /// rejected instead of truncated.
    ///
    /// # Example
    ///
    /// ```
    /// use payonphone_lib::{Amount, Currency};
    ///
    /// let amount = Amount::parse_major("15.99", &Currency::usd()).unwrap();
    /// assert_eq!(amount.minor_units(), 1599);
    /// ```
    pub fn parse_major(input: &str, currency: &Currency) -> Result<Self> {
        let trimmed = input.trim().trim_start_matches('$');
        if trimmed.is_empty() {
            return Err(TerminalError::invalid_amount(input, "amount is empty"));
        }

        let value = Decimal::from_str(trimmed)
            .map_err(|e| TerminalError::invalid_amount(input, e.to_string()))?;
        if value.is_sign_negative() || value.is_zero() {
            return Err(TerminalError::invalid_amount(input, "amount must be positive"));
        }

        let exponent = currency.exponent();
        if value.normalize().scale() > exponent {
            return Err(TerminalError::invalid_amount(
                input,
                format!("{} allows at most {} decimal places", currency, exponent),
            ));
        }

        let minor = value
            .checked_mul(Decimal::from(10u64.pow(exponent)))
            .ok_or_else(|| TerminalError::invalid_amount(input, "amount is too large"))?;
        let minor = u64::try_from(minor.trunc())
            .map_err(|_| TerminalError::invalid_amount(input, "amount is too large"))?;

        Self::from_minor(minor)
    }

    /// Value in minor units.
    pub fn minor_units(&self) -> u64 {
        self.0
    }

    /// Render in major units for display ("15.99").
    pub fn format_major(&self, currency: &Currency) -> String {
        Decimal::from_i128_with_scale(i128::from(self.0), currency.exponent()).to_string()
    }
}

impl TryFrom<u64> for Amount {
    type Error = TerminalError;

    fn try_from(value: u64) -> Result<Self> {
        Self::from_minor(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalization() {
        assert_eq!(Currency::new(" EUR ").unwrap().as_str(), "eur");
        assert!(Currency::new("us").is_err());
        assert!(Currency::new("u$d").is_err());
        assert_eq!(Currency::new("JPY").unwrap().exponent(), 0);
    }

    #[test]
    fn test_parse_major_units() {
        let usd = Currency::usd();
        assert_eq!(Amount::parse_major("15.99", &usd).unwrap().minor_units(), 1599);
        assert_eq!(Amount::parse_major("$2", &usd).unwrap().minor_units(), 200);
        assert_eq!(Amount::parse_major("0.10", &usd).unwrap().minor_units(), 10);
        assert_eq!(Amount::parse_major("7.50", &usd).unwrap().minor_units(), 750);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let usd = Currency::usd();
        for input in ["", "abc", "0", "0.00", "-5", "1.999"] {
            let err = Amount::parse_major(input, &usd).unwrap_err();
            assert!(
                matches!(err, TerminalError::InvalidAmount { .. }),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_decimal_currency() {
        let jpy = Currency::new("jpy").unwrap();
        assert_eq!(Amount::parse_major("500", &jpy).unwrap().minor_units(), 500);
        assert!(Amount::parse_major("500.5", &jpy).is_err());
        assert_eq!(Amount::from_minor(500).unwrap().format_major(&jpy), "500");
    }

    #[test]
    fn test_format_major() {
        let amount = Amount::from_minor(1599).unwrap();
        assert_eq!(amount.format_major(&Currency::usd()), "15.99");
        assert_eq!(Amount::from_minor(5).unwrap().format_major(&Currency::usd()), "0.05");
    }

    #[test]
    fn test_zero_minor_rejected() {
        assert!(Amount::from_minor(0).is_err());
        assert!(serde_json::from_str::<Amount>("0").is_err());
        assert_eq!(serde_json::from_str::<Amount>("1599").unwrap().minor_units(), 1599);
    }
}
