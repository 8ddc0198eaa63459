//! Fixed-point amounts for fiat prices and crypto quotes.
//!
//! Amounts travel over the wire as decimal strings with exactly
//! [`WIRE_SCALE`] fraction digits. Internally they are `Decimal`, so
//! compliance threshold comparisons are exact.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fraction digits used on the wire.
pub const WIRE_SCALE: u32 = 8;

/// Monetary amount with fixed-point precision.
///
/// # Examples
///
/// ```rust
/// use kioskpay_lib::Amount;
///
/// let price = Amount::from_str_checked("1234.56789012").unwrap();
/// assert_eq!(price.to_wire(), "1234.56789012");
/// assert_eq!(Amount::from_units(1000).to_wire(), "1000.00000000");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Zero amount.
    pub const ZERO: Amount = Amount {
        value: Decimal::ZERO,
    };

    /// Wrap a decimal value.
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Whole units of the currency (e.g. 1000 SGD).
    pub fn from_units(units: i64) -> Self {
        Self {
            value: Decimal::from(units),
        }
    }

    /// Parse a decimal string (e.g. "123.45").
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid decimal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kioskpay_lib::Amount;
    /// assert!(Amount::from_str_checked("999.99").is_ok());
    /// assert!(Amount::from_str_checked("ten").is_err());
    /// ```
    pub fn from_str_checked(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(|value| Self { value })
            .map_err(|e| format!("Invalid amount '{}': {}", s, e))
    }

    /// Parse leniently: anything unparseable becomes zero.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str_checked(s).unwrap_or_default()
    }

    /// The underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    /// True when strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Wire representation: fixed-point with exactly eight fraction digits.
    ///
    /// Values with more precision are rounded half away from zero.
    ///
    /// ```rust
    /// use kioskpay_lib::Amount;
    /// let a = Amount::from_str_checked("0.123456789").unwrap();
    /// assert_eq!(a.to_wire(), "0.12345679");
    /// ```
    pub fn to_wire(&self) -> String {
        let mut value = self
            .value
            .round_dp_with_strategy(WIRE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(WIRE_SCALE);
        value.to_string()
    }

    /// Checked addition (returns None on overflow)
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.value.checked_add(other.value).map(|value| Self { value })
    }

    /// Checked subtraction (returns None on overflow)
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.value.checked_sub(other.value).map(|value| Self { value })
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wire_pads_to_eight_digits() {
        assert_eq!(Amount::from_units(50).to_wire(), "50.00000000");
        assert_eq!(Amount::new(dec!(999.99)).to_wire(), "999.99000000");
    }

    #[test]
    fn test_wire_rounds_excess_precision() {
        assert_eq!(Amount::new(dec!(1.000000005)).to_wire(), "1.00000001");
        assert_eq!(Amount::new(dec!(1.000000004)).to_wire(), "1.00000000");
    }

    #[test]
    fn test_comparison_ignores_scale() {
        let a = Amount::from_str_checked("1000.00").unwrap();
        assert_eq!(a, Amount::from_units(1000));
        assert!(Amount::from_str_checked("999.99").unwrap() < a);
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(Amount::parse_lenient("garbage"), Amount::ZERO);
        assert_eq!(Amount::parse_lenient(" 12.5 "), Amount::new(dec!(12.5)));
        assert_eq!(Amount::parse_lenient("1e3"), Amount::from_units(1000));
    }

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::from_units(100);
        let b = Amount::new(dec!(0.5));
        assert_eq!(a.checked_add(&b).unwrap(), Amount::new(dec!(100.5)));
        assert_eq!(a.checked_sub(&b).unwrap(), Amount::new(dec!(99.5)));
    }

    #[test]
    fn test_is_positive() {
        assert!(Amount::new(dec!(0.00000001)).is_positive());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::from_units(-5).is_positive());
    }
}
