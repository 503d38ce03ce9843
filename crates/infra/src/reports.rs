//! Read-only reporting views over the ledger and the catalog.
//!
//! Reports take no locks and may observe a ledger that moves while they run;
//! each figure is consistent with some committed state, not necessarily the
//! same one across figures.

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate, NaiveTime};
use serde::Serialize;
use thiserror::Error;

use stockledger_core::{CategoryId, DomainError, Money, ProductId, WarehouseId};
use stockledger_inventory::StockTotals;

use crate::catalog::{Catalog, CatalogError};
use crate::config::{LedgerSettings, ReportSettings};
use crate::ledger::{LedgerError, LedgerStore, MovementFilter, MovementPage};

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid report window: {0}")]
    Window(String),

    /// A report sum left the range of its type.
    #[error("report figure overflows: {0}")]
    Overflow(String),
}

impl From<DomainError> for ReportError {
    fn from(value: DomainError) -> Self {
        ReportError::Overflow(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuationItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub cost_price: Money,
    /// `stock × cost_price`, rounded to cents.
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValuationReport {
    /// Sum of the exact item values, rounded once.
    pub total_value: Money,
    pub currency: String,
    pub product_count: usize,
    pub items: Vec<ValuationItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(rename = "in")]
    pub inbound: i64,
    #[serde(rename = "out")]
    pub outbound: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryShare {
    pub category_id: CategoryId,
    pub name: String,
    /// Stock value of the category's products, rounded to cents.
    pub value: Money,
    /// Units on hand across the category's products.
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseStock {
    pub warehouse_id: WarehouseId,
    pub name: String,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockItem {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub min_stock: i64,
}

/// Report queries. Generic over the same ledger and catalog backends as the
/// movement service.
#[derive(Debug)]
pub struct ReportService<L, C> {
    ledger: L,
    catalog: C,
    settings: ReportSettings,
    paging: LedgerSettings,
}

impl<L, C> ReportService<L, C>
where
    L: LedgerStore,
    C: Catalog,
{
    pub fn new(ledger: L, catalog: C, settings: ReportSettings, paging: LedgerSettings) -> Self {
        Self {
            ledger,
            catalog,
            settings,
            paging,
        }
    }

    /// Filtered history, newest first. `limit` falls back to the configured
    /// page size and is capped at the configured maximum.
    pub async fn movement_history(
        &self,
        filter: MovementFilter,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<MovementPage, ReportError> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(ReportError::Window(format!(
                    "start_date {start} is after end_date {end}"
                )));
            }
        }
        let pagination = self.paging.pagination(limit, offset);
        Ok(self.ledger.list_movements(filter, pagination).await?)
    }

    /// Every product's on-hand stock valued at cost.
    pub async fn valuation(&self) -> Result<ValuationReport, ReportError> {
        let products = self.catalog.list_products().await?;
        let totals = self.ledger.totals_by_product().await?;

        let mut exact_total = Money::ZERO;
        let mut items = Vec::with_capacity(products.len());
        for p in &products {
            let stock = on_hand(&totals, &p.id_typed());
            let value = p.cost_price().times(stock)?;
            exact_total = exact_total.checked_add(value)?;
            items.push(ValuationItem {
                product_id: p.id_typed(),
                sku: p.sku().to_string(),
                name: p.name().to_string(),
                stock,
                cost_price: p.cost_price(),
                value: value.rounded(),
            });
        }

        Ok(ValuationReport {
            total_value: exact_total.rounded(),
            currency: self.settings.currency.clone(),
            product_count: items.len(),
            items,
        })
    }

    /// Daily IN/OUT sums for the `trend_days` calendar days ending with
    /// `today` (UTC), oldest first. Days without movements report zeros.
    pub async fn stock_trend(&self, today: NaiveDate) -> Result<Vec<TrendPoint>, ReportError> {
        let span = u64::from(self.settings.trend_days.max(1));
        let first = today
            .checked_sub_days(Days::new(span - 1))
            .ok_or_else(|| ReportError::Window(format!("{span} days before {today}")))?;
        let after_last = today
            .succ_opt()
            .ok_or_else(|| ReportError::Window(format!("day after {today}")))?;

        let daily = self
            .ledger
            .daily_totals(
                first.and_time(NaiveTime::MIN).and_utc(),
                after_last.and_time(NaiveTime::MIN).and_utc(),
            )
            .await?;

        Ok(first
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|date| {
                let t = daily.get(&date).copied().unwrap_or_default();
                TrendPoint {
                    date,
                    inbound: t.inbound,
                    outbound: t.outbound,
                }
            })
            .collect())
    }

    /// Stock value and unit count per category, by category name.
    pub async fn category_distribution(&self) -> Result<Vec<CategoryShare>, ReportError> {
        let products = self.catalog.list_products().await?;
        let totals = self.ledger.totals_by_product().await?;
        let names: HashMap<CategoryId, String> = self
            .catalog
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id_typed(), c.name().to_string()))
            .collect();

        let mut groups: BTreeMap<CategoryId, (Money, i64)> = BTreeMap::new();
        for p in &products {
            let stock = on_hand(&totals, &p.id_typed());
            let entry = groups.entry(p.category_id()).or_insert((Money::ZERO, 0));
            entry.0 = entry.0.checked_add(p.cost_price().times(stock)?)?;
            entry.1 = entry.1.checked_add(stock).ok_or_else(|| {
                ReportError::Overflow(format!("unit count of category {}", p.category_id()))
            })?;
        }

        let mut shares: Vec<CategoryShare> = groups
            .into_iter()
            .map(|(category_id, (value, count))| CategoryShare {
                category_id,
                name: names
                    .get(&category_id)
                    .cloned()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                value: value.rounded(),
                count,
            })
            .collect();
        shares.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shares)
    }

    /// Net stock held by every warehouse, including empty ones.
    pub async fn warehouse_comparison(&self) -> Result<Vec<WarehouseStock>, ReportError> {
        let warehouses = self.catalog.list_warehouses().await?;
        let totals = self.ledger.totals_by_warehouse().await?;
        Ok(warehouses
            .into_iter()
            .map(|w| WarehouseStock {
                warehouse_id: w.id_typed(),
                stock: totals
                    .get(&w.id_typed())
                    .map(StockTotals::on_hand)
                    .unwrap_or(0),
                name: w.name().to_string(),
            })
            .collect())
    }

    /// Products at or below their `min_stock`, lowest stock first.
    pub async fn low_stock(&self) -> Result<Vec<LowStockItem>, ReportError> {
        let products = self.catalog.list_products().await?;
        let totals = self.ledger.totals_by_product().await?;
        let mut items: Vec<LowStockItem> = products
            .into_iter()
            .filter_map(|p| {
                let stock = on_hand(&totals, &p.id_typed());
                p.is_low_stock(stock).then(|| LowStockItem {
                    product_id: p.id_typed(),
                    sku: p.sku().to_string(),
                    name: p.name().to_string(),
                    stock,
                    min_stock: p.min_stock(),
                })
            })
            .collect();
        items.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }
}

fn on_hand(totals: &HashMap<ProductId, StockTotals>, id: &ProductId) -> i64 {
    totals.get(id).map(StockTotals::on_hand).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use stockledger_core::{UnitId, UserId};
    use stockledger_inventory::{
        AvailabilityCheck, Category, MovementKind, MovementRequest, Product, ProductDraft, Unit,
        Warehouse,
    };

    use crate::catalog::InMemoryCatalog;
    use crate::config::LedgerConfig;
    use crate::ledger::InMemoryLedgerStore;

    struct World {
        ledger: Arc<InMemoryLedgerStore>,
        catalog: Arc<InMemoryCatalog>,
        unit: UnitId,
    }

    impl World {
        fn new() -> Self {
            let catalog = Arc::new(InMemoryCatalog::new());
            let unit = Unit::new(UnitId::new(), "Piece", "pcs").unwrap();
            let unit_id = unit.id_typed();
            catalog.insert_unit(unit).unwrap();
            Self {
                ledger: Arc::new(InMemoryLedgerStore::new()),
                catalog,
                unit: unit_id,
            }
        }

        fn category(&self, name: &str) -> CategoryId {
            let c = Category::new(CategoryId::new(), name).unwrap();
            let id = c.id_typed();
            self.catalog.insert_category(c).unwrap();
            id
        }

        fn warehouse(&self, name: &str) -> WarehouseId {
            let w = Warehouse::new(WarehouseId::new(), name, None).unwrap();
            let id = w.id_typed();
            self.catalog.insert_warehouse(w).unwrap();
            id
        }

        fn product(&self, sku: &str, category: CategoryId, cost: rust_decimal::Decimal, min: i64) -> ProductId {
            let p = Product::new(
                ProductId::new(),
                ProductDraft {
                    sku: sku.into(),
                    name: sku.into(),
                    category_id: category,
                    unit_id: self.unit,
                    cost_price: cost,
                    sell_price: cost,
                    min_stock: min,
                },
            )
            .unwrap();
            let id = p.id_typed();
            self.catalog.insert_product(p).unwrap();
            id
        }

        fn move_at(
            &self,
            p: ProductId,
            w: WarehouseId,
            kind: MovementKind,
            qty: i64,
            at: DateTime<Utc>,
        ) {
            let m = MovementRequest::new(p, w, qty)
                .validate(kind, UserId::new())
                .unwrap();
            self.ledger.append_at(m, at).unwrap();
        }

        async fn record(&self, p: ProductId, w: WarehouseId, kind: MovementKind, qty: i64) {
            let m = MovementRequest::new(p, w, qty)
                .validate(kind, UserId::new())
                .unwrap();
            self.ledger.append(m, AvailabilityCheck::None).await.unwrap();
        }

        fn reports(&self) -> ReportService<Arc<InMemoryLedgerStore>, Arc<InMemoryCatalog>> {
            let cfg = LedgerConfig::default();
            ReportService::new(self.ledger.clone(), self.catalog.clone(), cfg.reports, cfg.ledger)
        }
    }

    #[tokio::test]
    async fn valuation_rounds_items_and_total_to_cents() {
        let world = World::new();
        let cat = world.category("Fasteners");
        let w = world.warehouse("Main");
        let a = world.product("A", cat, dec!(0.333), 0);
        let b = world.product("B", cat, dec!(1.005), 0);
        world.record(a, w, MovementKind::In, 3).await;
        world.record(b, w, MovementKind::In, 1).await;

        let report = world.reports().valuation().await.unwrap();
        let by_sku: HashMap<&str, &ValuationItem> =
            report.items.iter().map(|i| (i.sku.as_str(), i)).collect();

        assert_eq!(by_sku["A"].value, Money::new(dec!(1.00)));
        assert_eq!(by_sku["B"].value, Money::new(dec!(1.01)));
        // 0.999 + 1.005 = 2.004
        assert_eq!(report.total_value, Money::new(dec!(2.00)));
        assert_eq!(report.currency, "USD");
        assert_eq!(report.product_count, 2);
    }

    #[tokio::test]
    async fn trend_covers_seven_days_oldest_first() {
        let world = World::new();
        let cat = world.category("General");
        let w = world.warehouse("Main");
        let p = world.product("T", cat, dec!(1), 0);
        let today = NaiveDate::from_ymd_opt(2026, 5, 10).unwrap();
        let at = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2026, 5, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
                .and_utc()
        };

        world.move_at(p, w, MovementKind::In, 20, at(4, 8));
        world.move_at(p, w, MovementKind::Out, 5, at(4, 23));
        world.move_at(p, w, MovementKind::In, 7, at(10, 12));
        // Outside the window on both sides.
        world.move_at(p, w, MovementKind::In, 100, at(3, 23));
        world.move_at(p, w, MovementKind::In, 100, at(11, 0));

        let trend = world.reports().stock_trend(today).await.unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap());
        assert_eq!((trend[0].inbound, trend[0].outbound), (20, 5));
        assert_eq!(trend[6].date, today);
        assert_eq!(trend[6].inbound, 7);
        assert!(trend[1..6].iter().all(|t| t.inbound == 0 && t.outbound == 0));
    }

    #[tokio::test]
    async fn categories_and_warehouses_are_summed() {
        let world = World::new();
        let tools = world.category("Tools");
        let paint = world.category("Paint");
        let north = world.warehouse("North");
        let south = world.warehouse("South");
        let empty = world.warehouse("Spare");
        let hammer = world.product("H", tools, dec!(2.50), 0);
        let saw = world.product("S", tools, dec!(10), 0);
        let can = world.product("C", paint, dec!(4), 0);

        world.record(hammer, north, MovementKind::In, 4).await;
        world.record(saw, south, MovementKind::In, 1).await;
        world.record(can, south, MovementKind::In, 3).await;
        world.record(can, south, MovementKind::Out, 1).await;

        let reports = world.reports();
        let shares = reports.category_distribution().await.unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].name, "Paint");
        assert_eq!(shares[0].value, Money::new(dec!(8.00)));
        assert_eq!(shares[0].count, 2);
        assert_eq!(shares[1].name, "Tools");
        assert_eq!(shares[1].value, Money::new(dec!(20.00)));
        assert_eq!(shares[1].count, 5);

        let stock: HashMap<WarehouseId, i64> = reports
            .warehouse_comparison()
            .await
            .unwrap()
            .into_iter()
            .map(|w| (w.warehouse_id, w.stock))
            .collect();
        assert_eq!(stock[&north], 4);
        assert_eq!(stock[&south], 3);
        assert_eq!(stock[&empty], 0);
    }

    #[tokio::test]
    async fn low_stock_includes_products_at_threshold() {
        let world = World::new();
        let cat = world.category("General");
        let w = world.warehouse("Main");
        let at_min = world.product("AT", cat, dec!(1), 5);
        let above = world.product("UP", cat, dec!(1), 5);
        let never_moved = world.product("NV", cat, dec!(1), 0);
        world.record(at_min, w, MovementKind::In, 5).await;
        world.record(above, w, MovementKind::In, 6).await;

        let low: Vec<ProductId> = world
            .reports()
            .low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.product_id)
            .collect();
        assert_eq!(low, vec![never_moved, at_min]);
    }

    #[tokio::test]
    async fn oversized_totals_fail_instead_of_wrapping() {
        let world = World::new();
        let cat = world.category("Bulk");
        let w = world.warehouse("Main");
        let a = world.product("A", cat, dec!(0), 0);
        let b = world.product("B", cat, dec!(0), 0);
        world.record(a, w, MovementKind::In, i64::MAX - 1).await;
        world.record(b, w, MovementKind::In, i64::MAX - 1).await;

        let reports = world.reports();
        assert!(matches!(
            reports.warehouse_comparison().await,
            Err(ReportError::Ledger(LedgerError::Invariant(_)))
        ));
        assert!(matches!(
            reports.category_distribution().await,
            Err(ReportError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn valuation_beyond_decimal_range_is_an_error() {
        let world = World::new();
        let cat = world.category("Bulk");
        let w = world.warehouse("Main");
        let p = world.product("P", cat, dec!(10000000000), 0);
        world.record(p, w, MovementKind::In, i64::MAX - 1).await;

        assert!(matches!(
            world.reports().valuation().await,
            Err(ReportError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn history_rejects_inverted_window() {
        let world = World::new();
        let filter = MovementFilter {
            start_date: NaiveDate::from_ymd_opt(2026, 2, 2),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 1),
            ..MovementFilter::default()
        };
        let err = world
            .reports()
            .movement_history(filter, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Window(_)));
    }
}
