use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const NGN_CURRENCY_CODE: &str = "NGN";
pub const NGN_CURRENCY_CODE_LOWER: &str = "ngn";

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount in the minor unit of the base currency (kobo for NGN). All stored monetary values use
/// this representation; fractional major units never enter the database.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor currency units: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let naira = self.0 as f64 / 100.0;
        write!(f, "₦{naira:0.2}")
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// `const` constructor, for tariff tables and other compile-time amounts.
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub fn from_naira(naira: i64) -> Self {
        Self(naira * 100)
    }

    /// Clamps negative amounts to zero. Used when a voucher exceeds the basket total.
    pub fn floored(self) -> Self {
        Self(self.0.max(0))
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_delegates_to_inner_value() {
        let a = Money::from_naira(5_000);
        let b = Money::from_naira(3_000);
        assert_eq!(a + b, Money::from_naira(8_000));
        assert_eq!(a - b, Money::from_naira(2_000));
        assert_eq!(-b, Money::from(-300_000));
        assert_eq!(b * 3, Money::from_naira(9_000));
        let sum: Money = [a, b, b].into_iter().sum();
        assert_eq!(sum, Money::from_naira(11_000));
    }

    #[test]
    fn floor_clamps_negative_totals() {
        let total = Money::from_naira(2_000) - Money::from_naira(5_000);
        assert!(total.is_negative());
        assert_eq!(total.floored(), Money::from(0));
        assert_eq!(Money::from_naira(1).floored(), Money::from_naira(1));
    }

    #[test]
    fn display_renders_major_units() {
        assert_eq!(Money::from(150).to_string(), "₦1.50");
        assert_eq!(Money::from_naira(9_000).to_string(), "₦9000.00");
    }
}
