//! Domain error model.

use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a terminal, caller-visible outcome. Infrastructure never
/// swallows one of these silently; the expiry sweep is the only place that
/// logs and continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced stock record, order, purchase order, shipment or carrier does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requested quantity exceeds the available quantity at the point of check.
    #[error("insufficient stock for product {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: ProductId,
        requested: u64,
        available: u64,
    },

    /// A state transition was attempted from a state that disallows it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A quantity invariant would be violated (zero quantity, reserved > on-hand, ...).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A concurrent mutation invalidated the operation's precondition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input (e.g. an order without lines).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_stock(product: ProductId, requested: u64, available: u64) -> Self {
        Self::InsufficientStock {
            product,
            requested,
            available,
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }
}
