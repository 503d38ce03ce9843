//! Stock arithmetic: current stock is `Σ IN − Σ OUT` over matching movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId, WarehouseId};

use crate::error::MovementError;
use crate::movement::{MovementKind, NewMovement, Quantity, StockMovement};

/// Which pool a stock-out is checked against.
///
/// `Global` matches the historical behaviour: a withdrawal from any warehouse
/// is allowed as long as the product's total across all warehouses covers
/// it, so a single warehouse can go negative. `PerWarehouse` checks only the
/// warehouse named on the movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockScope {
    #[default]
    Global,
    PerWarehouse,
}

/// Selects the movements that contribute to a stock figure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    pub product_id: ProductId,
    pub warehouse_id: Option<WarehouseId>,
    /// Inclusive upper bound on `created_at`; `None` means "now".
    pub as_of: Option<DateTime<Utc>>,
}

impl StockQuery {
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            warehouse_id: None,
            as_of: None,
        }
    }

    pub fn in_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }

    pub fn matches(&self, movement: &StockMovement) -> bool {
        movement.product_id() == self.product_id
            && self
                .warehouse_id
                .is_none_or(|w| movement.warehouse_id() == w)
            && self.as_of.is_none_or(|t| movement.created_at() <= t)
    }
}

/// Inbound and outbound sums for one [`StockQuery`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockTotals {
    pub inbound: i64,
    pub outbound: i64,
}

impl StockTotals {
    pub fn on_hand(&self) -> i64 {
        self.inbound - self.outbound
    }

    pub fn sum_of(&self, kind: MovementKind) -> i64 {
        match kind {
            MovementKind::In => self.inbound,
            MovementKind::Out => self.outbound,
        }
    }

    /// Add one movement; fails rather than wrapping on overflow.
    pub fn record(self, kind: MovementKind, quantity: Quantity) -> DomainResult<Self> {
        let overflow = || DomainError::invariant("stock total overflows i64");
        Ok(match kind {
            MovementKind::In => Self {
                inbound: self.inbound.checked_add(quantity.get()).ok_or_else(overflow)?,
                ..self
            },
            MovementKind::Out => Self {
                outbound: self.outbound.checked_add(quantity.get()).ok_or_else(overflow)?,
                ..self
            },
        })
    }

    /// Combine two disjoint sets of totals; fails rather than wrapping.
    pub fn merge(self, other: Self) -> DomainResult<Self> {
        let overflow = || DomainError::invariant("stock total overflows i64");
        Ok(Self {
            inbound: self.inbound.checked_add(other.inbound).ok_or_else(overflow)?,
            outbound: self.outbound.checked_add(other.outbound).ok_or_else(overflow)?,
        })
    }

    /// Fold every movement selected by `query`.
    pub fn from_movements<'a>(
        query: &StockQuery,
        movements: impl IntoIterator<Item = &'a StockMovement>,
    ) -> DomainResult<Self> {
        movements
            .into_iter()
            .filter(|m| query.matches(m))
            .try_fold(Self::default(), |acc, m| acc.record(m.kind(), m.quantity()))
    }
}

/// Availability expectation evaluated atomically with an append, in the same
/// spirit as an expected-version check on an event stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AvailabilityCheck {
    /// Stock-in: cannot break non-negativity, nothing to check.
    None,
    /// Stock-out: on-hand stock in `scope` must cover the quantity.
    Require(StockScope),
}

impl AvailabilityCheck {
    /// The pool to sum for `movement`, if a check applies.
    pub fn query_for(&self, movement: &NewMovement) -> Option<StockQuery> {
        match self {
            AvailabilityCheck::None => None,
            AvailabilityCheck::Require(StockScope::Global) => {
                Some(StockQuery::product(movement.product_id))
            }
            AvailabilityCheck::Require(StockScope::PerWarehouse) => Some(
                StockQuery::product(movement.product_id).in_warehouse(movement.warehouse_id),
            ),
        }
    }

    /// Reject when `available` does not cover `requested`.
    pub fn ensure(available: i64, requested: Quantity) -> Result<(), MovementError> {
        if available < requested.get() {
            return Err(MovementError::InsufficientStock {
                available,
                requested: requested.get(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{MovementId, MovementRequest};
    use proptest::prelude::*;
    use stockledger_core::UserId;

    fn movement(
        id: i64,
        product: ProductId,
        warehouse: WarehouseId,
        kind: MovementKind,
        qty: i64,
        at: DateTime<Utc>,
    ) -> StockMovement {
        MovementRequest::new(product, warehouse, qty)
            .validate(kind, UserId::new())
            .unwrap()
            .into_recorded(MovementId::new(id), at)
    }

    #[test]
    fn no_movements_means_zero() {
        let totals = StockTotals::from_movements(&StockQuery::product(ProductId::new()), []).unwrap();
        assert_eq!(totals.on_hand(), 0);
    }

    #[test]
    fn query_filters_by_warehouse_and_as_of() {
        let p = ProductId::new();
        let w1 = WarehouseId::new();
        let w2 = WarehouseId::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(10);
        let ledger = vec![
            movement(1, p, w1, MovementKind::In, 100, t0),
            movement(2, p, w2, MovementKind::In, 40, t0),
            movement(3, p, w1, MovementKind::Out, 30, t1),
            movement(4, ProductId::new(), w1, MovementKind::In, 999, t0),
        ];

        let all = StockTotals::from_movements(&StockQuery::product(p), &ledger).unwrap();
        assert_eq!(all.on_hand(), 110);

        let w1_only =
            StockTotals::from_movements(&StockQuery::product(p).in_warehouse(w1), &ledger).unwrap();
        assert_eq!(w1_only.on_hand(), 70);

        let before_out =
            StockTotals::from_movements(&StockQuery::product(p).as_of(t0), &ledger).unwrap();
        assert_eq!(before_out.on_hand(), 140);
        assert_eq!(before_out.sum_of(MovementKind::Out), 0);
    }

    #[test]
    fn ensure_reports_available_and_requested() {
        let q = Quantity::new(9999).unwrap();
        assert_eq!(
            AvailabilityCheck::ensure(70, q),
            Err(MovementError::InsufficientStock {
                available: 70,
                requested: 9999
            })
        );
        assert!(AvailabilityCheck::ensure(70, Quantity::new(70).unwrap()).is_ok());
    }

    #[test]
    fn record_refuses_to_overflow() {
        let near_max = StockTotals {
            inbound: i64::MAX,
            outbound: 0,
        };
        assert!(near_max.record(MovementKind::In, Quantity::new(1).unwrap()).is_err());
    }

    #[test]
    fn merge_sums_both_sides_and_refuses_to_overflow() {
        let a = StockTotals {
            inbound: 10,
            outbound: 3,
        };
        let b = StockTotals {
            inbound: 5,
            outbound: 1,
        };
        assert_eq!(
            a.merge(b).unwrap(),
            StockTotals {
                inbound: 15,
                outbound: 4
            }
        );

        let huge = StockTotals {
            inbound: i64::MAX - 1,
            outbound: 0,
        };
        assert!(huge.merge(huge).is_err());
    }

    #[test]
    fn stock_in_needs_no_check() {
        let m = MovementRequest::new(ProductId::new(), WarehouseId::new(), 1)
            .validate(MovementKind::In, UserId::new())
            .unwrap();
        assert_eq!(AvailabilityCheck::None.query_for(&m), None);
        let scoped = AvailabilityCheck::Require(StockScope::PerWarehouse)
            .query_for(&m)
            .unwrap();
        assert_eq!(scoped.warehouse_id, Some(m.warehouse_id));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Applying a guarded sequence of IN/OUT requests never drives stock
        /// below zero, and the result always equals Σin − Σout of the accepted
        /// movements.
        #[test]
        fn guarded_sequences_never_go_negative(
            ops in prop::collection::vec((any::<bool>(), 1i64..500), 1..60)
        ) {
            let mut totals = StockTotals::default();
            let mut accepted_in = 0i64;
            let mut accepted_out = 0i64;

            for (is_in, qty) in ops {
                let q = Quantity::new(qty).unwrap();
                if is_in {
                    totals = totals.record(MovementKind::In, q).unwrap();
                    accepted_in += qty;
                } else if AvailabilityCheck::ensure(totals.on_hand(), q).is_ok() {
                    totals = totals.record(MovementKind::Out, q).unwrap();
                    accepted_out += qty;
                }
                prop_assert!(totals.on_hand() >= 0);
            }

            prop_assert_eq!(totals.on_hand(), accepted_in - accepted_out);
        }
    }
}
