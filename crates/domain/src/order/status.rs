//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a persisted order.
///
/// Status transitions:
/// ```text
/// Pending ──► InProgress ──┬──► Collected
///    │            │        └──► Delivered
///    │            │
///    └────────────┴──► Cancelled ◄── StockUnavailable
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Paid and persisted, waiting for the seller.
    #[default]
    Pending,

    /// Accepted by the seller.
    InProgress,

    /// Picked up by the buyer (terminal state).
    Collected,

    /// Delivered to the buyer (terminal state).
    Delivered,

    /// Cancelled (terminal state).
    Cancelled,

    /// Paid for, but stock ran out before it could be reserved.
    StockUnavailable,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Collected,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::StockUnavailable,
    ];

    /// Returns true if an order may move from this status to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Collected)
                | (InProgress, Delivered)
                | (InProgress, Cancelled)
                | (StockUnavailable, Cancelled)
        )
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Collected | OrderStatus::Delivered | OrderStatus::Cancelled
        )
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Collected => "COLLECTED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::StockUnavailable => "STOCK_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}
