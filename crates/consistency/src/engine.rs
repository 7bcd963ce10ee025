//! Single entry point wiring every component to one store and gateway.

use document_store::DocumentStore;
use domain::{BookId, RatingSummary, Review, Stars};

use crate::catalog::BookCatalog;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::fulfillment::{FulfillmentCoordinator, OrderBatch};
use crate::inventory::InventoryLedger;
use crate::orders::OrderService;
use crate::payment::PaymentGateway;
use crate::rating::RatingAggregator;
use crate::reviews::ReviewService;
use crate::state::BatchResult;

/// The consistency engine.
///
/// Holds no state of its own beyond the injected store, gateway and
/// configuration; every component shares the same store handle.
#[derive(Clone)]
pub struct ConsistencyEngine<S, P> {
    ledger: InventoryLedger<S>,
    ratings: RatingAggregator<S>,
    fulfillment: FulfillmentCoordinator<S, P>,
    reviews: ReviewService<S>,
    catalog: BookCatalog<S>,
    orders: OrderService<S>,
    config: EngineConfig,
}

impl<S, P> ConsistencyEngine<S, P>
where
    S: DocumentStore + Clone,
    P: PaymentGateway,
{
    pub fn new(store: S, gateway: P, config: EngineConfig) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone(), config.clone()),
            ratings: RatingAggregator::new(store.clone(), config.clone()),
            fulfillment: FulfillmentCoordinator::new(store.clone(), gateway, config.clone()),
            reviews: ReviewService::new(store.clone(), config.clone()),
            catalog: BookCatalog::new(store.clone(), config.clone()),
            orders: OrderService::new(store, config.clone()),
            config,
        }
    }

    /// Pays for, persists and reserves a checkout batch.
    pub async fn place_order_batch(&self, batch: OrderBatch) -> Result<BatchResult> {
        self.fulfillment.place_order_batch(batch).await
    }

    /// Counts a review that has just been stored.
    pub async fn record_review_created(&self, review: &Review) -> Result<RatingSummary> {
        self.ratings.record_review_created(review).await
    }

    /// Moves a stored review's contribution from `before` to its current stars.
    pub async fn record_review_updated(
        &self,
        before: Stars,
        review: &Review,
    ) -> Result<Option<RatingSummary>> {
        self.ratings.record_review_updated(before, review).await
    }

    /// Removes a deleted review's contribution.
    pub async fn record_review_deleted(&self, review: &Review) -> Result<RatingSummary> {
        self.ratings.record_review_deleted(review).await
    }

    /// Recounts a book's rating from its stored reviews.
    pub async fn rebuild_rating(&self, book_id: BookId) -> Result<RatingSummary> {
        self.ratings.rebuild(book_id).await
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    pub fn ratings(&self) -> &RatingAggregator<S> {
        &self.ratings
    }

    pub fn fulfillment(&self) -> &FulfillmentCoordinator<S, P> {
        &self.fulfillment
    }

    pub fn reviews(&self) -> &ReviewService<S> {
        &self.reviews
    }

    pub fn catalog(&self) -> &BookCatalog<S> {
        &self.catalog
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
