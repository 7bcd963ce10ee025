//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain rules, before anything touches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Star rating outside 1..=5.
    #[error("Invalid star rating: {0} (must be between 1 and 5)")]
    InvalidStars(u8),

    /// Quantity must be positive.
    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(u32),

    /// Amount must not be negative.
    #[error("Invalid amount: {0} (must not be negative)")]
    InvalidAmount(i64),

    /// The requested status change is not allowed.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Unrecognised order status name.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
