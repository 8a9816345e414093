//! Amount type for handling monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal` so that sums of amounts are exact.
//! Parsing tolerates an optional dollar sign and thousands separators.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents a currency amount.
///
/// The stored value is never rounded. Rounding to two decimal places only happens when the amount
/// is displayed.
///
/// # Examples
///
/// ```
/// # use fintrack::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,234.5").unwrap();
/// assert_eq!(amount.to_string(), "1,234.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount {
    value: Decimal,
}

/// The most decimal places a stored amount may have.
pub const MAX_DECIMAL_PLACES: u32 = 2;

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    /// The largest amount a transaction may carry: 999,999,999,999.99. Sums of any realistic
    /// number of such amounts stay far inside `Decimal`'s range, and every storable amount has at
    /// most 14 significant digits, so it is exact as an `f64`.
    pub const MAX: Amount = Amount::new(Decimal::from_parts(276_447_231, 23_283, 0, false, 2));

    pub const fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value().is_sign_positive()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }

    /// Why this amount cannot be stored on a transaction, or `None` if it can. A storable amount
    /// is positive, at most `Amount::MAX`, and has at most `MAX_DECIMAL_PLACES` decimal places.
    pub fn invalid_reason(&self) -> Option<String> {
        if !self.is_positive() {
            Some("amount must be greater than zero".to_string())
        } else if self.value > Amount::MAX.value {
            Some(format!("amount must be at most {}", Amount::MAX))
        } else if self.value.normalize().scale() > MAX_DECIMAL_PLACES {
            Some(format!(
                "amount must have at most {MAX_DECIMAL_PLACES} decimal places"
            ))
        } else {
            None
        }
    }

    /// The value as an `f64`, if converting it back gives exactly the same value.
    fn exact_f64(&self) -> Option<f64> {
        let f = self.value.to_f64()?;
        let back = Decimal::from_str(&f.to_string()).ok()?;
        (back == self.value).then_some(f)
    }
}

/// Rounds `value` to two decimal places for display, midpoints away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats a currency value with two decimal places and thousands separators, e.g. `-1,234.50`.
pub fn format_currency(value: Decimal) -> String {
    let rounded = round_currency(value);
    let (sign, num) = if rounded.is_sign_negative() && !rounded.is_zero() {
        ("-", rounded.abs())
    } else {
        ("", rounded.abs())
    };
    format!(
        "{sign}{}",
        format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
    )
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let without_dollar = if let Some(after_minus) = trimmed.strip_prefix('-') {
            match after_minus.strip_prefix('$') {
                Some(after_dollar) => format!("-{after_dollar}"),
                None => trimmed.to_string(),
            }
        } else if let Some(after_dollar) = trimmed.strip_prefix('$') {
            after_dollar.to_string()
        } else {
            trimmed.to_string()
        };

        let without_commas = without_dollar.replace(',', "");
        let value = Decimal::from_str(&without_commas).map_err(AmountError)?;
        Ok(Amount::new(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_currency(self.value))
    }
}

/// Amounts are written as JSON numbers, which is what existing exports and the remote sheet use.
/// A value that a number cannot carry exactly is written as a string instead.
impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.exact_f64() {
            Some(f) => serializer.serialize_f64(f),
            None => serializer.serialize_str(&self.value.to_string()),
        }
    }
}

/// Accepts either a JSON number or a string.
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let text = match Raw::deserialize(deserializer)? {
            // Display gives the shortest representation that round-trips, e.g. `0.1`.
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        Amount::from_str(&text).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50.00").unwrap();
        assert_eq!(amount.value(), dec("50"));
    }

    #[test]
    fn test_parse_with_dollar_sign_and_commas() {
        let amount = Amount::from_str("$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
    }

    #[test]
    fn test_parse_negative_with_dollar_sign() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), dec("-50"));
        assert!(amount.is_negative());
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("   ").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_zero_is_not_positive_or_negative() {
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::ZERO.is_negative());
    }

    #[test]
    fn test_display_rounds_half_away_from_zero() {
        assert_eq!(Amount::new(dec("2.345")).to_string(), "2.35");
        assert_eq!(Amount::new(dec("-2.345")).to_string(), "-2.35");
        assert_eq!(Amount::new(dec("60000")).to_string(), "60,000.00");
        assert_eq!(Amount::new(dec("-0.001")).to_string(), "0.00");
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&Amount::new(dec("300.5"))).unwrap();
        assert_eq!(json, "300.5");
    }

    #[test]
    fn test_deserialize_number_is_exact() {
        let amount: Amount = serde_json::from_str("0.1").unwrap();
        assert_eq!(amount.value(), dec("0.1"));
    }

    #[test]
    fn test_deserialize_string() {
        let amount: Amount = serde_json::from_str("\"$1,000.25\"").unwrap();
        assert_eq!(amount.value(), dec("1000.25"));
    }

    #[test]
    fn test_long_amount_is_written_as_exact_string() {
        let amount = Amount::new(dec("1234567890123456.78"));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1234567890123456.78\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_largest_storable_amount_is_a_number() {
        let json = serde_json::to_string(&Amount::MAX).unwrap();
        assert_eq!(json, "999999999999.99");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::MAX);
    }

    #[test]
    fn test_invalid_reason() {
        assert!(Amount::new(dec("0.01")).invalid_reason().is_none());
        assert!(Amount::new(dec("12.500")).invalid_reason().is_none());
        assert!(Amount::MAX.invalid_reason().is_none());
        assert!(Amount::ZERO.invalid_reason().is_some());
        assert!(Amount::new(dec("-1")).invalid_reason().is_some());
        assert!(Amount::new(dec("1000000000000")).invalid_reason().is_some());
        assert!(Amount::new(dec("2.345")).invalid_reason().is_some());
        let huge = Amount::new(dec("50000000000000000000000000000"));
        assert!(huge.invalid_reason().unwrap().starts_with("amount must be at most"));
    }

    #[test]
    fn test_sums_do_not_drift() {
        let tenth: Amount = serde_json::from_str("0.1").unwrap();
        let total: Decimal = (0..10).map(|_| tenth.value()).sum();
        assert_eq!(total, Decimal::ONE);
    }
}
