//! Value objects: equality by value, not identity.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for immutable values compared by their attributes.
///
/// `Money { 12.50 }` is the same value wherever it appears; a `Product` with
/// the same name as another is still a different product (see
/// [`Entity`](crate::Entity)).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Monetary amount in the single reporting currency.
///
/// Backed by a fixed-point [`Decimal`] so valuation sums never accumulate
/// binary floating-point drift. Report figures are rounded half away from
/// zero to two places with [`Money::rounded`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Unchecked constructor; use [`Money::price`] for user-supplied prices.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// A price: any amount `>= 0`.
    pub fn price(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation(format!(
                "price cannot be negative (got {amount})"
            )));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// `self × quantity`, exact. Fails instead of panicking when the product
    /// leaves the range of [`Decimal`].
    pub fn times(self, quantity: i64) -> DomainResult<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant(format!("{self} x {quantity} overflows")))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant(format!("{self} + {other} overflows")))
    }

    /// Rounded to cents, half away from zero.
    pub fn rounded(self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
