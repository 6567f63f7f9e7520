//! Fixed-point money representation using decimal arithmetic.
//!
//! All amounts in Tamarind are carried as [`Money`], a two-decimal-place
//! wrapper over [`rust_decimal::Decimal`]. Floating point never enters a
//! total. Payment gateways bill in minor units (paise, cents); the ×100
//! conversion happens only at that boundary, via [`Money::to_minor_units`].

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul};
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or converting [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The input string is not a valid decimal amount.
    #[error("invalid money amount: {0}")]
    Invalid(String),
    /// The amount does not fit in an i64 of minor units.
    #[error("amount out of range for minor units")]
    OutOfRange,
}

/// A monetary amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new amount, rounded to two decimal places (banker's rounding).
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(2))
    }

    /// Create an amount from minor units (e.g. 1999 paise -> 19.99).
    #[must_use]
    pub fn from_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Convert to minor units (×100) for the gateway boundary.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::OutOfRange` if the scaled amount does not fit
    /// in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round_dp(0)
            .to_i64()
            .ok_or(MoneyError::OutOfRange)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .map(Self::new)
            .map_err(|_| MoneyError::Invalid(s.to_owned()))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl ::sqlx::Type<::sqlx::Postgres> for Money {
    fn type_info() -> ::sqlx::postgres::PgTypeInfo {
        <Decimal as ::sqlx::Type<::sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for Money {
    fn decode(
        value: ::sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, ::sqlx::error::BoxDynError> {
        let amount = <Decimal as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount))
    }
}

#[cfg(feature = "postgres")]
impl ::sqlx::Encode<'_, ::sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut ::sqlx::postgres::PgArgumentBuffer,
    ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
        <Decimal as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The ISO 4217 code as sent to the payment gateway.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency code: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse_and_display() {
        let fee: Money = "10.00".parse().unwrap();
        assert_eq!(fee.to_string(), "10.00");
        assert!("ten rupees".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_rounds_to_two_places() {
        let m = Money::new(Decimal::from_str("19.999").unwrap());
        assert_eq!(m, "20.00".parse().unwrap());
    }

    #[test]
    fn test_money_arithmetic() {
        let a: Money = "19.99".parse().unwrap();
        let b: Money = "5.00".parse().unwrap();
        assert_eq!(a * 2 + b * 3, "54.98".parse().unwrap());

        let total: Money = [a, b].into_iter().sum();
        assert_eq!(total, "24.99".parse().unwrap());
    }

    #[test]
    fn test_minor_units_roundtrip() {
        let m: Money = "129.50".parse().unwrap();
        assert_eq!(m.to_minor_units().unwrap(), 12950);
        assert_eq!(Money::from_minor_units(12950), m);
    }

    #[test]
    fn test_minor_units_zero() {
        assert_eq!(Money::ZERO.to_minor_units().unwrap(), 0);
        assert!(Money::ZERO.is_zero());
    }

    #[test]
    fn test_currency_code_roundtrip() {
        assert_eq!(CurrencyCode::INR.as_str(), "INR");
        assert_eq!("INR".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
