//! Movement history queries: filters, pagination, pages.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, UserId, WarehouseId};
use stockledger_inventory::{MovementKind, StockMovement};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self::bounded(limit, offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Like [`Pagination::new`] with configured default and cap.
    pub fn bounded(limit: Option<u32>, offset: Option<u32>, default: u32, max: u32) -> Self {
        Self {
            limit: limit.unwrap_or(default).clamp(1, max.max(1)),
            offset: offset.unwrap_or(0),
        }
    }
}

/// History filter. Every field is optional; `None` matches everything.
///
/// The date bounds are whole calendar days (UTC), inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub kind: Option<MovementKind>,
    pub user_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl MovementFilter {
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    /// Inclusive lower bound as an instant.
    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    /// Exclusive upper bound: midnight after `end_date`.
    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }

    pub fn matches(&self, m: &StockMovement) -> bool {
        self.product_id.is_none_or(|p| m.product_id() == p)
            && self.warehouse_id.is_none_or(|w| m.warehouse_id() == w)
            && self.kind.is_none_or(|k| m.kind() == k)
            && self.user_id.is_none_or(|u| m.user_id() == u)
            && self.created_from().is_none_or(|from| m.created_at() >= from)
            && self.created_before().is_none_or(|before| m.created_at() < before)
    }
}

/// One page of history, newest first (`created_at` desc, then id desc).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<StockMovement>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl MovementPage {
    pub fn new(movements: Vec<StockMovement>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + movements.len() as u64;
        Self {
            movements,
            total,
            pagination,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_caps_and_defaults() {
        assert_eq!(Pagination::new(None, None).limit, DEFAULT_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(5000), None).limit, MAX_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
        assert_eq!(Pagination::bounded(Some(20), Some(40), 10, 100).offset, 40);
        assert_eq!(Pagination::bounded(None, None, 10, 100).limit, 10);
    }

    #[test]
    fn end_date_is_inclusive_for_the_whole_day() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 18).unwrap();
        let filter = MovementFilter {
            start_date: Some(d),
            end_date: Some(d),
            ..MovementFilter::default()
        };
        let from = filter.created_from().unwrap();
        let before = filter.created_before().unwrap();
        assert_eq!((before - from).num_hours(), 24);
    }
}
