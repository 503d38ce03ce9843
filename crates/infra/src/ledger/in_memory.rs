use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use stockledger_core::{ProductId, WarehouseId};
use stockledger_inventory::{
    AvailabilityCheck, MovementId, NewMovement, StockMovement, StockQuery, StockTotals,
};

use super::query::{MovementFilter, MovementPage, Pagination};
use super::store::{Appended, LedgerError, LedgerStore, replay_or_conflict};

#[derive(Debug, Default)]
struct LedgerState {
    /// Append order == id order.
    movements: Vec<StockMovement>,
    /// Running totals maintained alongside every append.
    by_product: HashMap<ProductId, StockTotals>,
    by_slot: HashMap<(ProductId, WarehouseId), StockTotals>,
    by_key: HashMap<String, usize>,
    last_id: i64,
    /// Highest `created_at` handed out; stamps never go backwards.
    last_created_at: Option<DateTime<Utc>>,
}

impl LedgerState {
    fn current(&self, query: &StockQuery) -> StockTotals {
        match query.warehouse_id {
            None => self.by_product.get(&query.product_id),
            Some(w) => self.by_slot.get(&(query.product_id, w)),
        }
        .copied()
        .unwrap_or_default()
    }
}

/// One (product, warehouse?) counter that disagrees with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterMismatch {
    pub product_id: ProductId,
    /// `None` for the product-wide counter.
    pub warehouse_id: Option<WarehouseId>,
    pub counter: StockTotals,
    pub ledger: StockTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub movements_scanned: usize,
    pub mismatches: Vec<CounterMismatch>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// In-process ledger for tests, benchmarks and single-node deployments.
///
/// Every append runs inside one write-lock critical section with no
/// suspension point, so check-and-append is atomic for all products. Current
/// stock is served from running counters updated in that same section;
/// [`InMemoryLedgerStore::reconcile`] re-derives them from the movement log.
///
/// `created_at` is stamped in the same section as
/// `max(clock(), last stamp)`, so timestamp order matches id order.
#[derive(Debug)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    clock: fn() -> DateTime<Utc>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            clock: Utc::now,
        }
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the timestamp source for appended movements.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    /// Total number of rows (diagnostics).
    pub fn len(&self) -> usize {
        self.read().map(|s| s.movements.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `at` bypasses the clock; only test fixtures backdate movements.
    fn append_locked(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
        at: Option<DateTime<Utc>>,
    ) -> Result<Appended, LedgerError> {
        let mut state = self.write()?;

        if let Some(key) = &movement.idempotency_key {
            if let Some(&idx) = state.by_key.get(key) {
                return replay_or_conflict(&movement, state.movements[idx].clone());
            }
        }

        if let Some(query) = check.query_for(&movement) {
            AvailabilityCheck::ensure(state.current(&query).on_hand(), movement.quantity)?;
        }

        let product = state
            .by_product
            .get(&movement.product_id)
            .copied()
            .unwrap_or_default()
            .record(movement.kind, movement.quantity)
            .map_err(|e| LedgerError::Invariant(e.to_string()))?;
        let slot_key = (movement.product_id, movement.warehouse_id);
        let slot = state
            .by_slot
            .get(&slot_key)
            .copied()
            .unwrap_or_default()
            .record(movement.kind, movement.quantity)
            .map_err(|e| LedgerError::Invariant(e.to_string()))?;

        // Nothing below can fail: the row and both counters land together.
        let id = MovementId::new(state.last_id + 1);
        let created_at = at.unwrap_or_else(|| {
            let now = (self.clock)();
            state.last_created_at.map_or(now, |last| now.max(last))
        });
        let recorded = movement.into_recorded(id, created_at);
        state.last_id = id.value();
        state.last_created_at = state.last_created_at.max(Some(created_at));
        state.by_product.insert(recorded.product_id(), product);
        state.by_slot.insert(slot_key, slot);
        if let Some(key) = recorded.idempotency_key() {
            let idx = state.movements.len();
            state.by_key.insert(key.to_string(), idx);
        }
        state.movements.push(recorded.clone());

        Ok(Appended::Created(recorded))
    }

    /// Re-derive every running counter from the movement log and report the
    /// ones that disagree. Read-only: counters are not repaired.
    pub fn reconcile(&self) -> Result<ReconciliationReport, LedgerError> {
        let state = self.read()?;

        let mut by_product: HashMap<ProductId, StockTotals> = HashMap::new();
        let mut by_slot: HashMap<(ProductId, WarehouseId), StockTotals> = HashMap::new();
        for m in &state.movements {
            let p = by_product.entry(m.product_id()).or_default();
            *p = p
                .record(m.kind(), m.quantity())
                .map_err(|e| LedgerError::Invariant(e.to_string()))?;
            let s = by_slot.entry((m.product_id(), m.warehouse_id())).or_default();
            *s = s
                .record(m.kind(), m.quantity())
                .map_err(|e| LedgerError::Invariant(e.to_string()))?;
        }

        let mut mismatches = Vec::new();
        let product_ids = by_product.keys().chain(state.by_product.keys());
        for &product_id in product_ids.collect::<BTreeSet<_>>() {
            let ledger = by_product.get(&product_id).copied().unwrap_or_default();
            let counter = state.by_product.get(&product_id).copied().unwrap_or_default();
            if ledger != counter {
                mismatches.push(CounterMismatch {
                    product_id,
                    warehouse_id: None,
                    counter,
                    ledger,
                });
            }
        }
        let slots = by_slot.keys().chain(state.by_slot.keys());
        for &(product_id, warehouse_id) in slots.collect::<BTreeSet<_>>() {
            let key = (product_id, warehouse_id);
            let ledger = by_slot.get(&key).copied().unwrap_or_default();
            let counter = state.by_slot.get(&key).copied().unwrap_or_default();
            if ledger != counter {
                mismatches.push(CounterMismatch {
                    product_id,
                    warehouse_id: Some(warehouse_id),
                    counter,
                    ledger,
                });
            }
        }

        if !mismatches.is_empty() {
            tracing::warn!(
                mismatches = mismatches.len(),
                "stock counters disagree with the movement log"
            );
        }

        Ok(ReconciliationReport {
            movements_scanned: state.movements.len(),
            mismatches,
        })
    }

    /// Append with an explicit timestamp, skipping the clock.
    #[cfg(test)]
    pub(crate) fn append_at(
        &self,
        movement: NewMovement,
        at: DateTime<Utc>,
    ) -> Result<StockMovement, LedgerError> {
        self.append_locked(movement, AvailabilityCheck::None, Some(at))
            .map(Appended::into_movement)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_counter_for_test(&self, product_id: ProductId, delta: i64) {
        if let Ok(mut state) = self.state.write() {
            let entry = state.by_product.entry(product_id).or_default();
            entry.inbound += delta;
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(
        &self,
        movement: NewMovement,
        check: AvailabilityCheck,
    ) -> Result<Appended, LedgerError> {
        self.append_locked(movement, check, None)
    }

    async fn totals(&self, query: StockQuery) -> Result<StockTotals, LedgerError> {
        let state = self.read()?;
        if query.as_of.is_none() {
            return Ok(state.current(&query));
        }
        StockTotals::from_movements(&query, &state.movements)
            .map_err(|e| LedgerError::Invariant(e.to_string()))
    }

    async fn totals_by_product(&self) -> Result<HashMap<ProductId, StockTotals>, LedgerError> {
        Ok(self.read()?.by_product.clone())
    }

    async fn totals_by_warehouse(
        &self,
    ) -> Result<HashMap<WarehouseId, StockTotals>, LedgerError> {
        let state = self.read()?;
        let mut out: HashMap<WarehouseId, StockTotals> = HashMap::new();
        for (&(_, warehouse_id), totals) in &state.by_slot {
            let entry = out.entry(warehouse_id).or_default();
            *entry = entry
                .merge(*totals)
                .map_err(|e| LedgerError::Invariant(e.to_string()))?;
        }
        Ok(out)
    }

    async fn daily_totals(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BTreeMap<NaiveDate, StockTotals>, LedgerError> {
        let state = self.read()?;
        let mut out: BTreeMap<NaiveDate, StockTotals> = BTreeMap::new();
        for m in state
            .movements
            .iter()
            .filter(|m| m.created_at() >= from && m.created_at() < to)
        {
            let day = out.entry(m.created_at().date_naive()).or_default();
            *day = day
                .record(m.kind(), m.quantity())
                .map_err(|e| LedgerError::Invariant(e.to_string()))?;
        }
        Ok(out)
    }

    async fn list_movements(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, LedgerError> {
        let state = self.read()?;
        let mut matching: Vec<&StockMovement> =
            state.movements.iter().filter(|m| filter.matches(m)).collect();
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id_typed().cmp(&a.id_typed()))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        Ok(MovementPage::new(page, total, pagination))
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<StockMovement>, LedgerError> {
        let state = self.read()?;
        Ok(state.by_key.get(key).map(|&idx| state.movements[idx].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use stockledger_core::UserId;
    use stockledger_inventory::{MovementKind, MovementRequest, StockScope};

    fn new_movement(
        product: ProductId,
        warehouse: WarehouseId,
        kind: MovementKind,
        qty: i64,
    ) -> NewMovement {
        MovementRequest::new(product, warehouse, qty)
            .validate(kind, UserId::new())
            .unwrap()
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = InMemoryLedgerStore::new();
        let p = ProductId::new();
        let w = WarehouseId::new();
        let a = store
            .append(new_movement(p, w, MovementKind::In, 5), AvailabilityCheck::None)
            .await
            .unwrap();
        let b = store
            .append(new_movement(p, w, MovementKind::In, 5), AvailabilityCheck::None)
            .await
            .unwrap();
        assert_eq!(a.movement().id_typed(), MovementId::new(1));
        assert_eq!(b.movement().id_typed(), MovementId::new(2));
    }

    #[tokio::test]
    async fn rejected_check_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        let p = ProductId::new();
        let w = WarehouseId::new();
        store
            .append(new_movement(p, w, MovementKind::In, 3), AvailabilityCheck::None)
            .await
            .unwrap();

        let err = store
            .append(
                new_movement(p, w, MovementKind::Out, 4),
                AvailabilityCheck::Require(StockScope::Global),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                available: 3,
                requested: 4
            }
        ));
        assert_eq!(store.len(), 1);
        assert!(store.reconcile().unwrap().is_consistent());
    }

    #[tokio::test]
    async fn as_of_totals_scan_history() {
        let store = InMemoryLedgerStore::new();
        let p = ProductId::new();
        let w = WarehouseId::new();
        let t0 = Utc::now() - Duration::hours(2);

        store
            .append_at(new_movement(p, w, MovementKind::In, 10), t0)
            .unwrap();
        store
            .append_at(
                new_movement(p, w, MovementKind::Out, 4),
                t0 + Duration::hours(1),
            )
            .unwrap();

        let before = store
            .totals(StockQuery::product(p).as_of(t0 + Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(before.on_hand(), 10);
        assert_eq!(store.totals(StockQuery::product(p)).await.unwrap().on_hand(), 6);
        assert_eq!(
            store
                .sum_quantity(StockQuery::product(p), MovementKind::Out)
                .await
                .unwrap(),
            4
        );
    }

    fn fixed_clock() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn clock_stamps_appended_movements() {
        let store = InMemoryLedgerStore::new().with_clock(fixed_clock);
        let appended = store
            .append(
                new_movement(ProductId::new(), WarehouseId::new(), MovementKind::In, 1),
                AvailabilityCheck::None,
            )
            .await
            .unwrap();
        assert_eq!(appended.movement().created_at(), fixed_clock());
    }

    #[tokio::test]
    async fn stamps_never_run_behind_an_earlier_append() {
        let store = InMemoryLedgerStore::new().with_clock(fixed_clock);
        let p = ProductId::new();
        let w = WarehouseId::new();
        let ahead = fixed_clock() + Duration::minutes(5);
        store
            .append_at(new_movement(p, w, MovementKind::In, 10), ahead)
            .unwrap();

        let out = store
            .append(
                new_movement(p, w, MovementKind::Out, 10),
                AvailabilityCheck::Require(StockScope::Global),
            )
            .await
            .unwrap();

        assert_eq!(out.movement().created_at(), ahead);
        let at_out = store
            .totals(StockQuery::product(p).as_of(out.movement().created_at()))
            .await
            .unwrap();
        assert_eq!(at_out.on_hand(), 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_with_id_tie_break() {
        let store = InMemoryLedgerStore::new().with_clock(fixed_clock);
        let p = ProductId::new();
        let w = WarehouseId::new();
        for _ in 0..3 {
            store
                .append(new_movement(p, w, MovementKind::In, 1), AvailabilityCheck::None)
                .await
                .unwrap();
        }

        let page = store
            .list_movements(MovementFilter::product(p), Pagination::new(Some(2), None))
            .await
            .unwrap();
        let ids: Vec<i64> = page.movements.iter().map(|m| m.id_typed().value()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(page.total, 3);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn reconcile_flags_drifted_counter() {
        let store = InMemoryLedgerStore::new();
        let p = ProductId::new();
        store
            .append(
                new_movement(p, WarehouseId::new(), MovementKind::In, 8),
                AvailabilityCheck::None,
            )
            .await
            .unwrap();

        store.corrupt_counter_for_test(p, 2);

        let report = store.reconcile().unwrap();
        assert_eq!(report.movements_scanned, 1);
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].counter.inbound, 10);
        assert_eq!(report.mismatches[0].ledger.inbound, 8);
    }

    #[tokio::test]
    async fn warehouse_totals_aggregate_across_products() {
        let store = InMemoryLedgerStore::new();
        let w = WarehouseId::new();
        for qty in [4, 6] {
            store
                .append(
                    new_movement(ProductId::new(), w, MovementKind::In, qty),
                    AvailabilityCheck::None,
                )
                .await
                .unwrap();
        }
        let by_wh = store.totals_by_warehouse().await.unwrap();
        assert_eq!(by_wh[&w].on_hand(), 10);
    }

    #[tokio::test]
    async fn warehouse_totals_refuse_to_overflow() {
        let store = InMemoryLedgerStore::new();
        let w = WarehouseId::new();
        for _ in 0..2 {
            store
                .append(
                    new_movement(ProductId::new(), w, MovementKind::In, i64::MAX - 1),
                    AvailabilityCheck::None,
                )
                .await
                .unwrap();
        }
        let err = store.totals_by_warehouse().await.unwrap_err();
        assert!(matches!(err, LedgerError::Invariant(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Checked appends accept exactly the withdrawals the running model
        /// allows, and no scope ever ends below zero.
        #[test]
        fn checked_outs_never_overdraw(
            per_warehouse in any::<bool>(),
            ops in prop::collection::vec((any::<bool>(), 1i64..50, 0usize..3), 1..80),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let scope = if per_warehouse { StockScope::PerWarehouse } else { StockScope::Global };
            let store = InMemoryLedgerStore::new();
            let p = ProductId::new();
            let warehouses = [WarehouseId::new(), WarehouseId::new(), WarehouseId::new()];
            let mut model = [0i64; 3];

            for (inbound, qty, wi) in ops {
                let kind = if inbound { MovementKind::In } else { MovementKind::Out };
                let check = if inbound {
                    AvailabilityCheck::None
                } else {
                    AvailabilityCheck::Require(scope)
                };
                let available = match scope {
                    StockScope::Global => model.iter().sum::<i64>(),
                    StockScope::PerWarehouse => model[wi],
                };
                let result = rt.block_on(store.append(new_movement(p, warehouses[wi], kind, qty), check));

                if inbound {
                    prop_assert!(result.is_ok());
                    model[wi] += qty;
                } else if available >= qty {
                    prop_assert!(result.is_ok());
                    model[wi] -= qty;
                } else {
                    let refused = matches!(
                        result,
                        Err(LedgerError::InsufficientStock { available: a, requested: r })
                            if a == available && r == qty
                    );
                    prop_assert!(refused);
                }
            }

            let global = rt.block_on(store.totals(StockQuery::product(p))).unwrap().on_hand();
            prop_assert_eq!(global, model.iter().sum::<i64>());
            prop_assert!(global >= 0);
            if per_warehouse {
                for (w, expected) in warehouses.iter().zip(model) {
                    let on_hand = rt
                        .block_on(store.totals(StockQuery::product(p).in_warehouse(*w)))
                        .unwrap()
                        .on_hand();
                    prop_assert_eq!(on_hand, expected);
                    prop_assert!(on_hand >= 0);
                }
            }
            prop_assert!(store.reconcile().unwrap().is_consistent());
        }
    }
}
