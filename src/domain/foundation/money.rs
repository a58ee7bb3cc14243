//! Currency codes and minor-unit amount conversion.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Currencies with no minor unit (amount 100 means 100 whole units).
const ZERO_DECIMAL: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Currencies with three decimal places.
const THREE_DECIMAL: &[&str] = &["bhd", "jod", "kwd", "omr", "tnd"];

/// Lowercase ISO-4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Normalizes and validates a three-letter currency code.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim().to_ascii_lowercase();
        if code.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not an ISO-4217 code", code),
            ));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places in the currency's minor unit.
    pub fn exponent(&self) -> u32 {
        if ZERO_DECIMAL.contains(&self.0.as_str()) {
            0
        } else if THREE_DECIMAL.contains(&self.0.as_str()) {
            3
        } else {
            2
        }
    }

    /// Converts a decimal string (`"10.00"`) to minor units.
    ///
    /// Rounds half away from zero at the currency exponent.
    pub fn to_minor_units(&self, value: &str) -> Result<i64, ValidationError> {
        let parsed = Decimal::from_str(value.trim()).map_err(|e| {
            ValidationError::invalid_format("amount", format!("'{}': {}", value, e))
        })?;
        let exponent = self.exponent();
        let scaled = parsed
            .round_dp_with_strategy(exponent, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::from(10_i64.pow(exponent)))
            .and_then(|d| d.to_i64());

        scaled.ok_or_else(|| {
            ValidationError::invalid_format("amount", format!("'{}' does not fit in i64", value))
        })
    }

    /// Renders minor units as a decimal string (`1001` -> `"10.01"`).
    pub fn format_minor_units(&self, amount: i64) -> String {
        let exponent = self.exponent();
        let mut value = Decimal::new(amount, exponent);
        value.rescale(exponent);
        value.to_string()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Currency {
        Currency::new("USD").unwrap()
    }

    #[test]
    fn new_lowercases_code() {
        assert_eq!(usd().as_str(), "usd");
    }

    #[test]
    fn new_rejects_invalid_codes() {
        assert!(Currency::new("").is_err());
        assert!(Currency::new("dollars").is_err());
        assert!(Currency::new("u5d").is_err());
    }

    #[test]
    fn two_decimal_conversion_rounds_half_away_from_zero() {
        assert_eq!(usd().to_minor_units("10.00").unwrap(), 1000);
        assert_eq!(usd().to_minor_units("10.005").unwrap(), 1001);
        assert_eq!(usd().to_minor_units("10.004").unwrap(), 1000);
        assert_eq!(usd().to_minor_units("-1.005").unwrap(), -101);
    }

    #[test]
    fn zero_decimal_currency_uses_whole_units() {
        let jpy = Currency::new("jpy").unwrap();
        assert_eq!(jpy.exponent(), 0);
        assert_eq!(jpy.to_minor_units("100").unwrap(), 100);
        assert_eq!(jpy.to_minor_units("100.5").unwrap(), 101);
    }

    #[test]
    fn three_decimal_currency_scales_by_thousand() {
        let kwd = Currency::new("KWD").unwrap();
        assert_eq!(kwd.to_minor_units("1.2345").unwrap(), 1235);
    }

    #[test]
    fn conversion_rejects_non_numeric_input() {
        assert!(usd().to_minor_units("ten").is_err());
    }

    #[test]
    fn format_minor_units_pads_to_exponent() {
        assert_eq!(usd().format_minor_units(1001), "10.01");
        assert_eq!(usd().format_minor_units(500), "5.00");
        assert_eq!(Currency::new("jpy").unwrap().format_minor_units(100), "100");
    }

    #[test]
    fn deserialization_validates_code() {
        let ok: Currency = serde_json::from_str("\"EUR\"").unwrap();
        assert_eq!(ok.as_str(), "eur");
        assert!(serde_json::from_str::<Currency>("\"euro\"").is_err());
    }
}
