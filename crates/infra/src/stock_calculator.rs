//! Current stock derived from the ledger.

use stockledger_core::ProductId;
use stockledger_inventory::{Product, StockQuery, StockTotals};

use crate::ledger::{LedgerError, LedgerStore};

/// `Σ IN − Σ OUT` over the movements a [`StockQuery`] selects.
///
/// Reads take no locks. A negative figure means the ledger is corrupt; it is
/// returned unclamped and logged at `error` so reconciliation can find it.
#[derive(Debug, Clone)]
pub struct StockCalculator<L> {
    ledger: L,
}

impl<L> StockCalculator<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// On-hand stock of `product_id` across all warehouses. Zero when the
    /// product has never moved.
    pub async fn current_stock(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        self.stock(StockQuery::product(product_id)).await
    }

    pub async fn stock(&self, query: StockQuery) -> Result<i64, LedgerError> {
        Ok(self.totals(query).await?.on_hand())
    }

    pub async fn totals(&self, query: StockQuery) -> Result<StockTotals, LedgerError> {
        let totals = self.ledger.totals(query).await?;
        if totals.on_hand() < 0 {
            tracing::error!(
                product_id = %query.product_id,
                warehouse_id = ?query.warehouse_id,
                inbound = totals.inbound,
                outbound = totals.outbound,
                "negative stock derived from ledger"
            );
        }
        Ok(totals)
    }

    /// `current_stock <= min_stock`.
    pub async fn is_low_stock(&self, product: &Product) -> Result<bool, LedgerError> {
        let on_hand = self.current_stock(product.id_typed()).await?;
        Ok(product.is_low_stock(on_hand))
    }
}
