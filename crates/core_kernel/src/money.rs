//! Money types with precise decimal arithmetic
//!
//! The ledger is single-currency. Every monetary value is a `rust_decimal`
//! with exactly two fractional digits (minor units), so sums and comparisons
//! are exact and the same value always renders the same way.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of fractional digits carried by every monetary value
pub const MONEY_SCALE: u32 = 2;

/// Largest value a balance or amount may hold: 999999999999999999.99,
/// the range of the `NUMERIC(20, 2)` storage columns
pub const MAX_MONEY: Decimal = Decimal::from_parts(1_661_992_959, 1_808_227_885, 5, false, MONEY_SCALE);

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Overflow during calculation")]
    Overflow,
}

fn to_scale(value: Decimal) -> Result<Decimal, MoneyError> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(MoneyError::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            value, MONEY_SCALE
        )));
    }
    let mut scaled = value;
    scaled.rescale(MONEY_SCALE);
    Ok(scaled)
}

fn within_range(value: Decimal) -> Result<Decimal, MoneyError> {
    if value > MAX_MONEY {
        return Err(MoneyError::InvalidAmount(format!(
            "{} exceeds the maximum of {}",
            value, MAX_MONEY
        )));
    }
    Ok(value)
}

/// A strictly positive amount of money moved by a ledger operation
///
/// Construction fails for zero, negative values and values with more than
/// two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Creates a new amount
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::InvalidAmount(format!(
                "{} must be greater than zero",
                value
            )));
        }
        Ok(Self(within_range(to_scale(value)?)?))
    }

    /// Creates an amount from an integer number of minor units (e.g. cents)
    pub fn from_minor(minor_units: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::new(minor_units, MONEY_SCALE))
    }

    /// Returns the amount as a decimal
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns the amount as a negative delta
    pub fn negated(&self) -> Decimal {
        -self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative balance held in an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a balance, rejecting negative values
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::InvalidAmount(format!(
                "balance {} cannot be negative",
                value
            )));
        }
        Ok(Self(within_range(to_scale(value)?)?))
    }

    /// Returns the balance as a decimal
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if nothing is held
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds an amount
    pub fn credit(&self, amount: Amount) -> Result<Self, MoneyError> {
        self.apply(amount.value())
    }

    /// Subtracts an amount, failing rather than going negative
    pub fn debit(&self, amount: Amount) -> Result<Self, MoneyError> {
        self.apply(amount.negated())
    }

    /// Applies a signed delta, failing rather than going negative
    pub fn apply(&self, delta: Decimal) -> Result<Self, MoneyError> {
        let delta = to_scale(delta)?;
        let next = self.0.checked_add(delta).ok_or(MoneyError::Overflow)?;
        if next.is_sign_negative() && !next.is_zero() {
            return Err(MoneyError::InsufficientFunds {
                balance: self.0,
                requested: delta.abs(),
            });
        }
        if next > MAX_MONEY {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(next))
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn credit_then_debit_restores_balance(
            start in 0i64..1_000_000_000i64,
            moved in 1i64..1_000_000_000i64
        ) {
            let balance = Balance::new(Decimal::new(start, MONEY_SCALE)).unwrap();
            let amount = Amount::from_minor(moved).unwrap();

            let restored = balance.credit(amount).unwrap().debit(amount).unwrap();
            prop_assert_eq!(restored, balance);
        }

        #[test]
        fn debit_never_goes_negative(
            start in 0i64..1_000_000i64,
            moved in 1i64..2_000_000i64
        ) {
            let balance = Balance::new(Decimal::new(start, MONEY_SCALE)).unwrap();
            let amount = Amount::from_minor(moved).unwrap();

            match balance.debit(amount) {
                Ok(after) => prop_assert!(after.value() >= Decimal::ZERO),
                Err(e) => {
                    prop_assert!(moved > start);
                    let is_insufficient = matches!(e, MoneyError::InsufficientFunds { .. });
                    prop_assert!(is_insufficient);
                }
            }
        }
    }
}
