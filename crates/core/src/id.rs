//! Strongly-typed identifiers for reference data and actors.
//!
//! Movement ids are not here: they are integers assigned by the ledger store
//! (see `stockledger_inventory::MovementId`).

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Authenticated actor recorded on every movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(Uuid);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(Uuid);

macro_rules! uuid_id {
    ($t:ty, $label:literal) => {
        impl $t {
            /// Fresh time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s.trim())
                    .map(Self)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $label, e)))
            }
        }
    };
}

uuid_id!(UserId, "UserId");
uuid_id!(ProductId, "ProductId");
uuid_id!(WarehouseId, "WarehouseId");
uuid_id!(CategoryId, "CategoryId");
uuid_id!(UnitId, "UnitId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_through_display() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_reports_which_identifier_failed() {
        let err = "not-a-uuid".parse::<WarehouseId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("WarehouseId")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn serializes_transparently() {
        let id = UserId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
    }
}
