//! Typed failures of stock-in / stock-out requests.

use thiserror::Error;

use stockledger_core::{DomainError, ProductId, WarehouseId};

/// Coarse failure category, for callers that map errors to responses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or range; rejected before touching the ledger.
    Validation,
    /// Unknown product or warehouse; rejected before touching the ledger.
    Referential,
    /// Rejected at the atomic check-and-append boundary; nothing written.
    BusinessRule,
    /// Storage/transaction failure; nothing committed, safe to retry.
    Storage,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MovementError {
    #[error("invalid quantity {requested}: must be a positive integer")]
    InvalidQuantity { requested: i64 },

    #[error("invalid movement request: {0}")]
    Validation(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("warehouse {0} not found")]
    WarehouseNotFound(WarehouseId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("idempotency key '{0}' was already used for a different movement")]
    IdempotencyConflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl MovementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MovementError::InvalidQuantity { .. } | MovementError::Validation(_) => {
                ErrorKind::Validation
            }
            MovementError::ProductNotFound(_) | MovementError::WarehouseNotFound(_) => {
                ErrorKind::Referential
            }
            MovementError::InsufficientStock { .. } | MovementError::IdempotencyConflict(_) => {
                ErrorKind::BusinessRule
            }
            MovementError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only storage failures are worth resubmitting unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

impl From<DomainError> for MovementError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                MovementError::Validation(msg)
            }
            other => MovementError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(MovementError::Storage("connection reset".into()).is_retryable());
        assert!(
            !MovementError::InsufficientStock {
                available: 1,
                requested: 2
            }
            .is_retryable()
        );
        assert!(!MovementError::InvalidQuantity { requested: 0 }.is_retryable());
    }

    #[test]
    fn insufficient_stock_message_names_both_quantities() {
        let msg = MovementError::InsufficientStock {
            available: 70,
            requested: 9999,
        }
        .to_string();
        assert!(msg.contains("9999"));
        assert!(msg.contains("70"));
    }
}
