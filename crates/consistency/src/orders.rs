//! Order reads and seller-driven status changes.

use chrono::{DateTime, Utc};
use document_store::{DocumentQuery, DocumentStore};
use domain::{Order, OrderId, OrderStatus, ProfileId, collections};
use serde::{Deserialize, Serialize};

use crate::cas::{bounded, update_with_retry};
use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};

/// Request to move an order to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> OrderService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let doc = bounded(
            self.config.store_timeout,
            "get_order",
            self.store.get(collections::ORDER, order_id.document_id()),
        )
        .await?
        .ok_or(ConsistencyError::NotFound {
            collection: collections::ORDER,
            id: order_id.document_id(),
        })?;
        Ok(doc.decode()?)
    }

    /// Applies a validated status transition under compare-and-set.
    #[tracing::instrument(skip(self), fields(order_id = %order_id, to = %update.status))]
    pub async fn update_status(&self, order_id: OrderId, update: StatusUpdate) -> Result<Order> {
        let (order, from) = update_with_retry(
            &self.store,
            &self.config,
            collections::ORDER,
            order_id.document_id(),
            |order: &mut Order| {
                let from = order.status;
                order.transition(update.status, update.delivery_date, Utc::now())?;
                Ok(from)
            },
        )
        .await?;

        metrics::counter!("order_status_changes_total", "to" => order.status.as_str())
            .increment(1);
        tracing::info!(%from, "order status changed");
        Ok(order)
    }

    /// Orders placed by `buyer_id`, optionally restricted to `statuses`.
    pub async fn orders_for_buyer(
        &self,
        buyer_id: ProfileId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>> {
        self.orders_where("buyer_id", buyer_id, statuses).await
    }

    /// Orders awaiting `seller_id`, optionally restricted to `statuses`.
    pub async fn orders_for_seller(
        &self,
        seller_id: ProfileId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>> {
        self.orders_where("seller_id", seller_id, statuses).await
    }

    async fn orders_where(
        &self,
        field: &'static str,
        profile_id: ProfileId,
        statuses: &[OrderStatus],
    ) -> Result<Vec<Order>> {
        let docs = bounded(
            self.config.store_timeout,
            "find_orders",
            self.store.find(
                DocumentQuery::new(collections::ORDER).field_eq(field, profile_id.to_string()),
            ),
        )
        .await?;

        let mut orders = Vec::with_capacity(docs.len());
        for doc in &docs {
            let order: Order = doc.decode()?;
            if statuses.is_empty() || statuses.contains(&order.status) {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
