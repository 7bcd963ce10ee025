//! Book catalog: listing and reading books.

use chrono::Utc;
use document_store::{ConditionalUpdate, DocumentStore, NewDocument, UpdateOutcome};
use domain::{Book, BookId, BookListing, ProfileId, collections};
use serde::{Deserialize, Serialize};

use crate::cas::bounded;
use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};

/// Request to list a new book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub seller_id: ProfileId,
    #[serde(flatten)]
    pub listing: BookListing,
    #[serde(default)]
    pub stocks_left: u64,
}

/// Creates and reads books, and edits their listing fields.
///
/// Stock and rating fields are never written here: new books start with
/// an empty rating, and listing updates replace [`BookListing`] only.
#[derive(Clone)]
pub struct BookCatalog<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> BookCatalog<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    #[tracing::instrument(skip(self, new), fields(seller_id = %new.seller_id))]
    pub async fn create_book(&self, new: NewBook) -> Result<Book> {
        let book = Book::list(
            BookId::new(),
            new.seller_id,
            new.listing,
            new.stocks_left,
            Utc::now(),
        );
        let document =
            NewDocument::from_serializable(collections::BOOK, book.id.document_id(), &book)?;
        bounded(
            self.config.store_timeout,
            "insert_book",
            self.store.insert(document),
        )
        .await?;

        tracing::info!(book_id = %book.id, stocks_left = book.stocks_left, "book listed");
        Ok(book)
    }

    pub async fn get_book(&self, book_id: BookId) -> Result<Book> {
        let doc = bounded(
            self.config.store_timeout,
            "get_book",
            self.store.get(collections::BOOK, book_id.document_id()),
        )
        .await?
        .ok_or(ConsistencyError::NotFound {
            collection: collections::BOOK,
            id: book_id.document_id(),
        })?;
        Ok(doc.decode()?)
    }

    /// Replaces a book's listing fields.
    #[tracing::instrument(skip(self, listing), fields(book_id = %book_id))]
    pub async fn update_listing(&self, book_id: BookId, listing: BookListing) -> Result<Book> {
        let update = ConditionalUpdate::typed(move |book: &mut Book| {
            book.update_listing(listing, Utc::now());
        });

        let outcome = bounded(
            self.config.store_timeout,
            "update_listing",
            self.store
                .atomic_update(collections::BOOK, book_id.document_id(), update),
        )
        .await?;

        match outcome {
            UpdateOutcome::Applied(doc) => {
                tracing::info!("listing updated");
                Ok(doc.decode()?)
            }
            UpdateOutcome::PredicateFailed(_) | UpdateOutcome::NotFound => {
                Err(ConsistencyError::NotFound {
                    collection: collections::BOOK,
                    id: book_id.document_id(),
                })
            }
        }
    }
}
