//! Checkout batch state machine and per-line results.

use domain::{BookId, Money, OrderId};
use serde::{Deserialize, Serialize};

use crate::payment::ChargeId;

/// The state of a checkout batch.
///
/// State transitions:
/// ```text
/// Received ──► Paid ──► Persisted ──┬──► Fulfilled
///    │           │                  └──► PartiallyFulfilled
///    │           └──► PersistFailed
///    └──► PaymentFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    /// Validated, not yet charged.
    #[default]
    Received,

    /// Charge captured.
    Paid,

    /// Order documents written.
    Persisted,

    /// Every line persisted and reserved (terminal state).
    Fulfilled,

    /// The charge failed; nothing was written (terminal state).
    PaymentFailed,

    /// Paid, but no order could be written (terminal state).
    PersistFailed,

    /// Paid, but at least one line was not fulfilled (terminal state).
    PartiallyFulfilled,
}

impl FulfillmentState {
    /// Returns true if the batch can be charged in this state.
    pub fn can_charge(&self) -> bool {
        matches!(self, FulfillmentState::Received)
    }

    /// Returns true if orders can be persisted in this state.
    pub fn can_persist(&self) -> bool {
        matches!(self, FulfillmentState::Paid)
    }

    /// Returns true if stock can be reserved in this state.
    pub fn can_reserve(&self) -> bool {
        matches!(self, FulfillmentState::Persisted)
    }

    /// Returns true if the diagram above has an edge from `self` to `next`.
    pub fn can_transition_to(&self, next: FulfillmentState) -> bool {
        use FulfillmentState::*;
        match next {
            Paid | PaymentFailed => self.can_charge(),
            Persisted | PersistFailed => self.can_persist(),
            Fulfilled | PartiallyFulfilled => self.can_reserve(),
            Received => false,
        }
    }

    /// Moves to `next` if that is a legal step. An illegal step is logged
    /// and leaves the state unchanged; returns whether the move happened.
    pub fn advance(&mut self, next: FulfillmentState) -> bool {
        if !self.can_transition_to(next) {
            tracing::error!(from = %self, to = %next, "illegal batch state change");
            return false;
        }
        tracing::debug!(from = %self, to = %next, "batch state changed");
        *self = next;
        true
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FulfillmentState::Fulfilled
                | FulfillmentState::PaymentFailed
                | FulfillmentState::PersistFailed
                | FulfillmentState::PartiallyFulfilled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentState::Received => "RECEIVED",
            FulfillmentState::Paid => "PAID",
            FulfillmentState::Persisted => "PERSISTED",
            FulfillmentState::Fulfilled => "FULFILLED",
            FulfillmentState::PaymentFailed => "PAYMENT_FAILED",
            FulfillmentState::PersistFailed => "PERSIST_FAILED",
            FulfillmentState::PartiallyFulfilled => "PARTIALLY_FULFILLED",
        }
    }
}

impl std::fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to one line of a paid batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineOutcome {
    /// Order persisted and stock reserved.
    Fulfilled,

    /// The order document could not be written. When `retryable`, the write
    /// timed out and the order may exist under the reported id.
    PersistFailed { reason: String, retryable: bool },

    /// Order persisted but stock ran out; the order is `STOCK_UNAVAILABLE`.
    StockUnavailable { available: u64 },

    /// Order persisted but the reservation failed for another reason.
    ReserveFailed { reason: String, retryable: bool },
}

impl LineOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            LineOutcome::Fulfilled => "fulfilled",
            LineOutcome::PersistFailed { .. } => "persist_failed",
            LineOutcome::StockUnavailable { .. } => "stock_unavailable",
            LineOutcome::ReserveFailed { .. } => "reserve_failed",
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, LineOutcome::Fulfilled)
    }

    pub fn is_persist_failure(&self) -> bool {
        matches!(self, LineOutcome::PersistFailed { .. })
    }
}

/// Result for one submitted line, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineResult {
    pub index: usize,
    pub book_id: BookId,
    pub quantity: u32,
    pub order_id: Option<OrderId>,
    #[serde(flatten)]
    pub outcome: LineOutcome,
}

/// Result of a paid checkout batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub charge_id: ChargeId,
    pub amount: Money,
    pub state: FulfillmentState,
    pub lines: Vec<LineResult>,
}

impl BatchResult {
    /// Derives the terminal state from the line outcomes.
    pub(crate) fn settle(charge_id: ChargeId, amount: Money, lines: Vec<LineResult>) -> Self {
        let state = if lines.iter().all(|l| l.outcome.is_fulfilled()) {
            FulfillmentState::Fulfilled
        } else if lines.iter().all(|l| l.outcome.is_persist_failure()) {
            FulfillmentState::PersistFailed
        } else {
            FulfillmentState::PartiallyFulfilled
        };
        Self {
            charge_id,
            amount,
            state,
            lines,
        }
    }

    /// Returns the orders that were written, fulfilled or not, plus those
    /// whose write timed out and may exist.
    pub fn order_ids(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.lines.iter().filter_map(|l| l.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(index: usize, order: bool, outcome: LineOutcome) -> LineResult {
        LineResult {
            index,
            book_id: BookId::new(),
            quantity: 1,
            order_id: order.then(OrderId::new),
            outcome,
        }
    }

    #[test]
    fn test_default_state_is_received() {
        assert_eq!(FulfillmentState::default(), FulfillmentState::Received);
    }

    #[test]
    fn test_step_guards() {
        assert!(FulfillmentState::Received.can_charge());
        assert!(!FulfillmentState::Paid.can_charge());
        assert!(FulfillmentState::Paid.can_persist());
        assert!(!FulfillmentState::Received.can_persist());
        assert!(FulfillmentState::Persisted.can_reserve());
        assert!(!FulfillmentState::Paid.can_reserve());
    }

    #[test]
    fn test_transitions_follow_the_guards() {
        use FulfillmentState::*;
        let all = [
            Received,
            Paid,
            Persisted,
            Fulfilled,
            PaymentFailed,
            PersistFailed,
            PartiallyFulfilled,
        ];
        let legal = [
            (Received, Paid),
            (Received, PaymentFailed),
            (Paid, Persisted),
            (Paid, PersistFailed),
            (Persisted, Fulfilled),
            (Persisted, PartiallyFulfilled),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_illegal_advance_keeps_state() {
        let mut state = FulfillmentState::Received;
        assert!(!state.advance(FulfillmentState::Persisted));
        assert_eq!(state, FulfillmentState::Received);

        assert!(state.advance(FulfillmentState::Paid));
        assert!(state.advance(FulfillmentState::PersistFailed));
        assert!(!state.advance(FulfillmentState::Fulfilled));
        assert_eq!(state, FulfillmentState::PersistFailed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!FulfillmentState::Received.is_terminal());
        assert!(!FulfillmentState::Paid.is_terminal());
        assert!(!FulfillmentState::Persisted.is_terminal());
        assert!(FulfillmentState::Fulfilled.is_terminal());
        assert!(FulfillmentState::PaymentFailed.is_terminal());
        assert!(FulfillmentState::PersistFailed.is_terminal());
        assert!(FulfillmentState::PartiallyFulfilled.is_terminal());
    }

    #[test]
    fn test_settle_all_fulfilled() {
        let result = BatchResult::settle(
            ChargeId::new("ch_1"),
            Money::from_minor(100),
            vec![line(0, true, LineOutcome::Fulfilled), line(1, true, LineOutcome::Fulfilled)],
        );
        assert_eq!(result.state, FulfillmentState::Fulfilled);
        assert_eq!(result.order_ids().count(), 2);
    }

    #[test]
    fn test_settle_partial() {
        let result = BatchResult::settle(
            ChargeId::new("ch_1"),
            Money::from_minor(100),
            vec![
                line(0, true, LineOutcome::Fulfilled),
                line(1, true, LineOutcome::StockUnavailable { available: 0 }),
            ],
        );
        assert_eq!(result.state, FulfillmentState::PartiallyFulfilled);
    }

    #[test]
    fn test_settle_nothing_persisted() {
        let failed = |retryable| LineOutcome::PersistFailed {
            reason: "store unavailable".to_string(),
            retryable,
        };
        let result = BatchResult::settle(
            ChargeId::new("ch_1"),
            Money::from_minor(100),
            vec![line(0, false, failed(false)), line(1, true, failed(true))],
        );
        assert_eq!(result.state, FulfillmentState::PersistFailed);
        assert_eq!(result.order_ids().count(), 1);
    }

    #[test]
    fn test_line_serializes_outcome_inline() {
        let json = serde_json::to_value(line(
            0,
            true,
            LineOutcome::StockUnavailable { available: 1 },
        ))
        .unwrap();
        assert_eq!(json["outcome"], "STOCK_UNAVAILABLE");
        assert_eq!(json["available"], 1);
        assert_eq!(json["quantity"], 1);
    }
}
