//! Order fulfillment coordinator for checkout batches.

use std::time::Instant;

use chrono::{DateTime, Utc};
use document_store::{ConditionalUpdate, DocumentStore, NewDocument, UpdateOutcome};
use domain::{BookId, Money, Order, OrderId, OrderLine, OrderStatus, ProfileId, collections};
use serde::{Deserialize, Serialize};

use crate::cas::bounded;
use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};
use crate::inventory::InventoryLedger;
use crate::payment::{ChargeRequest, PaymentGateway};
use crate::state::{BatchResult, FulfillmentState, LineOutcome, LineResult};

/// A buyer's checkout: one payment covering every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch {
    pub buyer_id: ProfileId,
    pub payment_token: String,
    #[serde(default)]
    pub receipt_email: Option<String>,
    pub lines: Vec<OrderLine>,
}

impl OrderBatch {
    /// Checks the batch before any money moves.
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(ConsistencyError::InvalidBatch(
                "at least one line is required".to_string(),
            ));
        }
        for line in &self.lines {
            line.validate()?;
        }
        self.total()?;
        Ok(())
    }

    /// Sum of the line amounts. Fails if the total does not fit in `Money`.
    pub fn total(&self) -> Result<Money> {
        Money::checked_sum(self.lines.iter().map(|line| line.amount)).ok_or_else(|| {
            ConsistencyError::InvalidBatch("order total overflows".to_string())
        })
    }

    fn description(&self) -> String {
        let copies: u64 = self.lines.iter().map(|l| u64::from(l.quantity)).sum();
        format!(
            "{copies} book(s) in {} order(s) for buyer {}",
            self.lines.len(),
            self.buyer_id
        )
    }
}

/// Sequences payment, order persistence and stock reservation.
///
/// ```text
/// charge(total) ──► insert one PENDING order per line ──► reserve per order
/// ```
///
/// A declined charge aborts the batch before anything is written. After
/// the charge, each line succeeds or fails on its own and is reported in
/// the [`BatchResult`]. Captured payments are never reversed here.
#[derive(Clone)]
pub struct FulfillmentCoordinator<S, P> {
    store: S,
    ledger: InventoryLedger<S>,
    gateway: P,
    config: EngineConfig,
}

impl<S, P> FulfillmentCoordinator<S, P>
where
    S: DocumentStore + Clone,
    P: PaymentGateway,
{
    pub fn new(store: S, gateway: P, config: EngineConfig) -> Self {
        let ledger = InventoryLedger::new(store.clone(), config.clone());
        Self {
            store,
            ledger,
            gateway,
            config,
        }
    }

    /// Places a checkout batch.
    ///
    /// Returns `PaymentFailed` (nothing persisted, no stock moved) when the
    /// charge does not go through; otherwise a [`BatchResult`] with one
    /// entry per line in submission order.
    #[tracing::instrument(skip(self, batch), fields(buyer_id = %batch.buyer_id, lines = batch.lines.len()))]
    pub async fn place_order_batch(&self, batch: OrderBatch) -> Result<BatchResult> {
        metrics::counter!("order_batches_total").increment(1);
        let started = Instant::now();
        let mut state = FulfillmentState::Received;

        batch.validate()?;
        let amount = batch.total()?;

        // Received -> Paid
        let request = ChargeRequest {
            amount,
            currency: self.config.currency.clone(),
            token: batch.payment_token.clone(),
            description: batch.description(),
            receipt_email: batch.receipt_email.clone(),
        };
        let charge_id = match bounded(
            self.config.store_timeout,
            "charge",
            self.gateway.charge(request),
        )
        .await
        {
            Ok(charge_id) => charge_id,
            Err(err) => {
                metrics::counter!("payment_failures_total").increment(1);
                state.advance(FulfillmentState::PaymentFailed);
                tracing::warn!(%amount, error = %err, "payment failed, nothing persisted");
                return Err(err);
            }
        };
        state.advance(FulfillmentState::Paid);
        tracing::info!(%charge_id, %amount, "payment captured");

        // Paid -> Persisted | PersistFailed
        let now = Utc::now();
        let mut lines = Vec::with_capacity(batch.lines.len());
        for (index, line) in batch.lines.iter().enumerate() {
            let order = Order::place(batch.buyer_id, line, now);
            let (order_id, outcome) = match self.persist(&order).await {
                // Provisional until the reservation below settles it.
                Ok(()) => (Some(order.id), LineOutcome::Fulfilled),
                Err(err) => {
                    tracing::error!(index, book_id = %line.book_id, error = %err, "failed to persist order");
                    // A timed-out insert may still land, so its id is reported.
                    let retryable = err.is_retryable();
                    (
                        retryable.then_some(order.id),
                        LineOutcome::PersistFailed {
                            reason: err.to_string(),
                            retryable,
                        },
                    )
                }
            };
            lines.push(LineResult {
                index,
                book_id: line.book_id,
                quantity: line.quantity,
                order_id,
                outcome,
            });
        }

        if lines.iter().all(|l| l.outcome.is_persist_failure()) {
            state.advance(FulfillmentState::PersistFailed);
        } else {
            state.advance(FulfillmentState::Persisted);

            // Persisted -> Fulfilled | PartiallyFulfilled
            for line in &mut lines {
                if line.outcome.is_persist_failure() {
                    continue;
                }
                if let Some(order_id) = line.order_id {
                    line.outcome = self
                        .reserve_line(order_id, line.book_id, line.quantity)
                        .await;
                }
            }
        }
        for line in &lines {
            metrics::counter!("order_lines_total", "outcome" => line.outcome.label()).increment(1);
        }

        let result = BatchResult::settle(charge_id, amount, lines);
        if state != result.state {
            state.advance(result.state);
        }
        metrics::histogram!("order_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(state = %state, charge_id = %result.charge_id, "batch settled");
        Ok(result)
    }

    async fn persist(&self, order: &Order) -> Result<()> {
        let document =
            NewDocument::from_serializable(collections::ORDER, order.id.document_id(), order)?;
        bounded(
            self.config.store_timeout,
            "persist_order",
            self.store.insert(document),
        )
        .await?;
        Ok(())
    }

    async fn reserve_line(&self, order_id: OrderId, book_id: BookId, quantity: u32) -> LineOutcome {
        match self.ledger.reserve(book_id, quantity).await {
            Ok(_) => LineOutcome::Fulfilled,
            Err(ConsistencyError::InsufficientStock { available, .. }) => {
                self.mark_stock_unavailable(order_id, Utc::now()).await;
                LineOutcome::StockUnavailable { available }
            }
            Err(err @ ConsistencyError::NotFound { .. }) => {
                self.mark_stock_unavailable(order_id, Utc::now()).await;
                LineOutcome::ReserveFailed {
                    reason: err.to_string(),
                    retryable: false,
                }
            }
            Err(err) => {
                // The order stays PENDING so it can be reconciled.
                tracing::error!(%order_id, %book_id, error = %err, "reservation failed");
                LineOutcome::ReserveFailed {
                    reason: err.to_string(),
                    retryable: err.is_retryable(),
                }
            }
        }
    }

    async fn mark_stock_unavailable(&self, order_id: OrderId, now: DateTime<Utc>) {
        let pending = serde_json::Value::from(OrderStatus::Pending.as_str());
        let update =
            ConditionalUpdate::try_typed(move |order: &mut Order| order.mark_stock_unavailable(now))
                .when(move |doc| doc.field("status") == Some(&pending));

        let outcome = bounded(
            self.config.store_timeout,
            "mark_stock_unavailable",
            self.store
                .atomic_update(collections::ORDER, order_id.document_id(), update),
        )
        .await;

        match outcome {
            Ok(UpdateOutcome::Applied(_)) => {
                tracing::warn!(%order_id, "order marked STOCK_UNAVAILABLE");
            }
            Ok(other) => {
                tracing::error!(%order_id, ?other, "order was not pending, status left unchanged");
            }
            Err(err) => {
                tracing::error!(%order_id, error = %err, "failed to mark order STOCK_UNAVAILABLE");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;
    use domain::{Book, BookListing};

    use super::*;
    use crate::payment::InMemoryPaymentGateway;

    struct Harness {
        store: InMemoryDocumentStore,
        gateway: InMemoryPaymentGateway,
        coordinator: FulfillmentCoordinator<InMemoryDocumentStore, InMemoryPaymentGateway>,
    }

    impl Harness {
        fn new() -> Self {
            let store = InMemoryDocumentStore::new();
            let gateway = InMemoryPaymentGateway::new();
            let coordinator =
                FulfillmentCoordinator::new(store.clone(), gateway.clone(), EngineConfig::default());
            Self {
                store,
                gateway,
                coordinator,
            }
        }

        async fn book(&self, stock: u64) -> Book {
            let book = Book::list(
                BookId::new(),
                ProfileId::new(),
                BookListing::default(),
                stock,
                Utc::now(),
            );
            self.store
                .insert(
                    NewDocument::from_serializable(
                        collections::BOOK,
                        book.id.document_id(),
                        &book,
                    )
                    .unwrap(),
                )
                .await
                .unwrap();
            book
        }

        async fn order(&self, order_id: OrderId) -> Order {
            self.store
                .get(collections::ORDER, order_id.document_id())
                .await
                .unwrap()
                .unwrap()
                .decode()
                .unwrap()
        }
    }

    fn line(book: &Book, quantity: u32, amount: i64) -> OrderLine {
        OrderLine {
            book_id: book.id,
            seller_id: book.seller_id,
            quantity,
            amount: Money::from_minor(amount),
            delivery: None,
        }
    }

    fn batch(lines: Vec<OrderLine>) -> OrderBatch {
        OrderBatch {
            buyer_id: ProfileId::new(),
            payment_token: "tok_visa".to_string(),
            receipt_email: None,
            lines,
        }
    }

    #[tokio::test]
    async fn test_all_lines_fulfilled() {
        let h = Harness::new();
        let a = h.book(2).await;
        let b = h.book(1).await;

        let result = h
            .coordinator
            .place_order_batch(batch(vec![line(&a, 2, 1000), line(&b, 1, 500)]))
            .await
            .unwrap();

        assert_eq!(result.state, FulfillmentState::Fulfilled);
        assert_eq!(result.amount, Money::from_minor(1500));
        assert_eq!(h.gateway.charges()[0].amount, Money::from_minor(1500));
        assert_eq!(h.gateway.charges()[0].currency, "inr");
        for order_id in result.order_ids() {
            assert_eq!(h.order(order_id).await.status, OrderStatus::Pending);
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected_before_charging() {
        let h = Harness::new();
        let err = h
            .coordinator
            .place_order_batch(batch(vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsistencyError::InvalidBatch(_)));
        assert_eq!(h.gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_overflowing_total_is_rejected_before_charging() {
        let h = Harness::new();
        let a = h.book(2).await;
        let err = h
            .coordinator
            .place_order_batch(batch(vec![line(&a, 1, i64::MAX), line(&a, 1, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsistencyError::InvalidBatch(ref reason) if reason.contains("overflows")));
        assert_eq!(h.gateway.charge_count(), 0);
        assert_eq!(h.store.document_count(collections::ORDER).await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected_before_charging() {
        let h = Harness::new();
        let a = h.book(2).await;
        let err = h
            .coordinator
            .place_order_batch(batch(vec![line(&a, 0, 100)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ConsistencyError::Validation(_)));
        assert_eq!(h.gateway.charge_count(), 0);
        assert_eq!(h.store.document_count(collections::ORDER).await, 0);
    }

    #[tokio::test]
    async fn test_missing_book_marks_order() {
        let h = Harness::new();
        let ghost = Book::list(
            BookId::new(),
            ProfileId::new(),
            BookListing::default(),
            1,
            Utc::now(),
        );

        let result = h
            .coordinator
            .place_order_batch(batch(vec![line(&ghost, 1, 100)]))
            .await
            .unwrap();

        assert_eq!(result.state, FulfillmentState::PartiallyFulfilled);
        assert!(matches!(
            result.lines[0].outcome,
            LineOutcome::ReserveFailed {
                retryable: false,
                ..
            }
        ));
        let order_id = result.lines[0].order_id.unwrap();
        assert_eq!(h.order(order_id).await.status, OrderStatus::StockUnavailable);
    }
}
