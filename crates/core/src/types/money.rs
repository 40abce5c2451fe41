//! Monetary amounts using decimal arithmetic.
//!
//! Every branch trades in a single currency, so `Money` carries only the
//! amount. Values are kept to two decimal places at every step of a sale;
//! rounding happens through [`Money::round`] which rounds midpoints away
//! from zero, matching how receipts are printed at the counter.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A monetary amount in the branch currency's standard unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Number of decimal places kept for currency values.
    pub const SCALE: u32 = 2;

    /// Zero amount.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from minor units (e.g. centavos).
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, Self::SCALE))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Round to two decimal places, midpoints away from zero.
    #[must_use]
    pub fn round(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Returns `true` if the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns `true` if the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, flooring the result at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    /// `percent`% of this amount, rounded.
    #[must_use]
    pub fn percent_of(self, percent: Decimal) -> Self {
        Self(self.0 * percent / Decimal::ONE_HUNDRED).round()
    }

    /// Multiply by a rate (e.g. a tax rate of `0.12`), rounded.
    #[must_use]
    pub fn apply_rate(self, rate: Decimal) -> Self {
        Self(self.0 * rate).round()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_midpoint_away_from_zero() {
        assert_eq!(Money::new(Decimal::new(1005, 3)).round(), Money::from_minor(101));
        assert_eq!(Money::new(Decimal::new(1004, 3)).round(), Money::from_minor(100));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Money::from_minor(500);
        let b = Money::from_minor(800);
        assert_eq!(a.saturating_sub(b), Money::zero());
        assert_eq!(b.saturating_sub(a), Money::from_minor(300));
    }

    #[test]
    fn test_percent_of() {
        let price = Money::from_minor(125_000);
        assert_eq!(price.percent_of(Decimal::new(15, 0)), Money::from_minor(18_750));
    }

    #[test]
    fn test_apply_rate_rounds() {
        // 333.33 * 0.12 = 39.9996
        let net = Money::from_minor(33_333);
        assert_eq!(net.apply_rate(Decimal::new(12, 2)), Money::from_minor(4_000));
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Money = [Money::from_minor(250), Money::from_minor(100) * 3]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_minor(550));
    }

    #[test]
    fn test_display_two_places() {
        assert_eq!(Money::new(Decimal::new(15, 0)).to_string(), "15.00");
        assert_eq!(Money::from_minor(123_450).to_string(), "1234.50");
    }

    #[test]
    fn test_serde_uses_string_decimal() {
        let json = serde_json::to_string(&Money::from_minor(1999)).unwrap_or_default();
        assert_eq!(json, "\"19.99\"");
    }
}
