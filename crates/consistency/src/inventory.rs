//! Inventory ledger: the only writer of a book's stock fields.

use chrono::Utc;
use document_store::{ConditionalUpdate, DocumentStore, UpdateOutcome};
use domain::{Book, BookId, DomainError, StockLevel, collections};

use crate::cas::bounded;
use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};

/// Owns "stock is never negative" and `in_stock == (stocks_left > 0)`.
///
/// Every movement is a single conditional update in the store, so the floor
/// check and the decrement cannot be separated by a concurrent writer.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> InventoryLedger<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Takes `quantity` copies of a book if at least that many are left.
    #[tracing::instrument(skip(self), fields(book_id = %book_id))]
    pub async fn reserve(&self, book_id: BookId, quantity: u32) -> Result<StockLevel> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity(quantity).into());
        }
        let wanted = u64::from(quantity);

        let update = ConditionalUpdate::typed(move |book: &mut Book| {
            book.take_stock(wanted, Utc::now());
        })
        .when(move |doc| doc.u64_field("stocks_left").is_some_and(|left| left >= wanted));

        let outcome = bounded(
            self.config.store_timeout,
            "reserve",
            self.store
                .atomic_update(collections::BOOK, book_id.document_id(), update),
        )
        .await?;

        match outcome {
            UpdateOutcome::Applied(doc) => {
                let level = doc.decode::<Book>()?.stock_level();
                metrics::counter!("inventory_reservations_total").increment(1);
                tracing::info!(
                    quantity,
                    stocks_left = level.stocks_left,
                    in_stock = level.in_stock,
                    "stock reserved"
                );
                Ok(level)
            }
            UpdateOutcome::PredicateFailed(doc) => {
                let available = doc.u64_field("stocks_left").unwrap_or(0);
                metrics::counter!("inventory_insufficient_stock_total").increment(1);
                tracing::warn!(quantity, available, "insufficient stock");
                Err(ConsistencyError::InsufficientStock {
                    book_id: book_id.document_id(),
                    requested: wanted,
                    available,
                })
            }
            UpdateOutcome::NotFound => Err(self.not_found(book_id)),
        }
    }

    /// Adds `quantity` copies to a book.
    #[tracing::instrument(skip(self), fields(book_id = %book_id))]
    pub async fn restock(&self, book_id: BookId, quantity: u32) -> Result<StockLevel> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity(quantity).into());
        }
        let added = u64::from(quantity);

        let update = ConditionalUpdate::typed(move |book: &mut Book| {
            book.add_stock(added, Utc::now());
        });

        let outcome = bounded(
            self.config.store_timeout,
            "restock",
            self.store
                .atomic_update(collections::BOOK, book_id.document_id(), update),
        )
        .await?;

        match outcome {
            UpdateOutcome::Applied(doc) => {
                let level = doc.decode::<Book>()?.stock_level();
                metrics::counter!("inventory_restocks_total").increment(1);
                tracing::info!(quantity, stocks_left = level.stocks_left, "stock replenished");
                Ok(level)
            }
            UpdateOutcome::PredicateFailed(_) | UpdateOutcome::NotFound => {
                Err(self.not_found(book_id))
            }
        }
    }

    /// Reads the current stock level of a book.
    pub async fn stock_level(&self, book_id: BookId) -> Result<StockLevel> {
        let doc = bounded(
            self.config.store_timeout,
            "stock_level",
            self.store.get(collections::BOOK, book_id.document_id()),
        )
        .await?
        .ok_or_else(|| self.not_found(book_id))?;

        Ok(doc.decode::<Book>()?.stock_level())
    }

    fn not_found(&self, book_id: BookId) -> ConsistencyError {
        ConsistencyError::NotFound {
            collection: collections::BOOK,
            id: book_id.document_id(),
        }
    }
}
