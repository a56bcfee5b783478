//! Decimal money amounts.
//!
//! Prices and sale totals are kept as [`rust_decimal::Decimal`] so that
//! `9.99 * 2` is exactly `19.98`. The hosted backend stores them in
//! `NUMERIC(12, 2)` columns and inside JSON documents, so they travel as JSON
//! numbers.
//!
//! User input is held to the column's shape: at most two decimal places and
//! below [`Money::LIMIT`]. Arithmetic saturates instead of panicking, since
//! amounts read back from the store are not re-validated.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a money amount from user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("not a number: {0:?}")]
    NotANumber(String),
    #[error("amount must not be negative")]
    Negative,
    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: u32 },
    #[error("amount must be less than {limit}")]
    TooLarge { limit: u64 },
}

/// An amount in the till's single currency (dollars, not cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Decimal places a stored amount can carry.
    pub const MAX_SCALE: u32 = 2;

    /// Exclusive upper bound on a stored amount (`NUMERIC(12, 2)`).
    pub const LIMIT: u64 = 10_000_000_000;

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from whole cents, e.g. `from_cents(999)` is `$9.99`.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Parse a non-negative amount typed by a user (`"9.99"`, `" 12 "`).
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::NotANumber` if the input is not a decimal number,
    /// `MoneyError::Negative` if it is below zero, and `TooManyDecimals` or
    /// `TooLarge` if the store could not hold it.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        let amount = Decimal::from_str(trimmed)
            .map_err(|_| MoneyError::NotANumber(trimmed.to_string()))?
            .normalize();
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if amount.scale() > Self::MAX_SCALE {
            return Err(MoneyError::TooManyDecimals {
                max: Self::MAX_SCALE,
            });
        }
        if amount >= Decimal::from(Self::LIMIT) {
            return Err(MoneyError::TooLarge { limit: Self::LIMIT });
        }
        Ok(Self(amount))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// This amount multiplied by a quantity, saturating at the decimal range.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// The amount formatted for input fields, without currency symbol.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0.round_dp(2))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The store keeps prices as JSON numbers (including inside sale items).
        // Validated amounts have at most 12 significant digits, which an f64
        // carries exactly to two decimals.
        match self.0.to_f64() {
            Some(value) => serializer.serialize_f64(value),
            None => serializer.serialize_str(&self.0.to_string()),
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_decimal_input() {
        assert_eq!(Money::parse("9.99").unwrap(), Money::from_cents(999));
        assert_eq!(Money::parse("  12 ").unwrap(), Money::from_cents(1200));
        assert_eq!(Money::parse("0").unwrap(), Money::ZERO);
    }

    #[test]
    fn test_parse_rejects_non_numbers() {
        assert!(matches!(
            Money::parse("abc"),
            Err(MoneyError::NotANumber(_))
        ));
        assert!(matches!(Money::parse(""), Err(MoneyError::NotANumber(_))));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(Money::parse("-1.50"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_parse_holds_input_to_stored_shape() {
        assert_eq!(Money::parse("9.990").unwrap(), Money::from_cents(999));
        assert_eq!(
            Money::parse("9.999"),
            Err(MoneyError::TooManyDecimals { max: 2 })
        );
        assert_eq!(
            Money::parse("9999999999.99").unwrap(),
            Money::from_cents(999_999_999_999)
        );
        assert_eq!(
            Money::parse("10000000000"),
            Err(MoneyError::TooLarge {
                limit: Money::LIMIT
            })
        );
        assert_eq!(
            Money::parse("79228162514264337593543950335"),
            Err(MoneyError::TooLarge {
                limit: Money::LIMIT
            })
        );
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.times(2), max);
        assert_eq!(max + Money::from_cents(1), max);

        let total: Money = [max, max].into_iter().sum();
        assert_eq!(total, max);
        assert!(!total.to_string().is_empty());
    }

    #[test]
    fn test_largest_stored_amount_serializes_exactly() {
        let json = serde_json::to_string(&Money::parse("9999999999.99").unwrap()).unwrap();
        assert_eq!(json, "9999999999.99");
    }

    #[test]
    fn test_times_is_exact() {
        let total = Money::from_cents(999).times(2);
        assert_eq!(total, Money::from_cents(1998));
        assert_eq!(total.to_string(), "$19.98");
    }

    #[test]
    fn test_display_pads_to_cents() {
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(400));
    }

    #[test]
    fn test_serializes_as_json_number() {
        let json = serde_json::to_string(&Money::from_cents(999)).unwrap();
        assert_eq!(json, "9.99");
    }

    #[test]
    fn test_deserializes_from_number_and_string() {
        let from_number: Money = serde_json::from_str("19.98").unwrap();
        let from_string: Money = serde_json::from_str("\"19.98\"").unwrap();
        assert_eq!(from_number, Money::from_cents(1998));
        assert_eq!(from_string, Money::from_cents(1998));
    }
}
