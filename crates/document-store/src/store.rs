use async_trait::async_trait;

use crate::{
    ConditionalUpdate, Document, DocumentId, DocumentQuery, NewDocument, Result, UpdateOutcome,
    Version,
};

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync). Every method is a
/// single store round trip; `atomic_update` is the only read-modify-write
/// primitive and implementations must apply it indivisibly per document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieves a document by id.
    ///
    /// Returns None if no such document exists in the collection.
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>>;

    /// Inserts a new document at [`Version::first`].
    ///
    /// Fails with `DuplicateDocument` if the id is already taken.
    async fn insert(&self, document: NewDocument) -> Result<DocumentId>;

    /// Evaluates the update's conditions against the current document and,
    /// if they hold, applies its mutation and bumps the version, all as one
    /// atomic step.
    async fn atomic_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: ConditionalUpdate,
    ) -> Result<UpdateOutcome>;

    /// Deletes a document. Returns the number of documents removed (0 or 1).
    async fn delete(&self, collection: &str, id: DocumentId) -> Result<u64>;

    /// Deletes a document and returns it as it was at the moment of removal.
    ///
    /// Of several concurrent callers, exactly one receives the document.
    async fn take(&self, collection: &str, id: DocumentId) -> Result<Option<Document>>;

    /// Retrieves documents matching a query, oldest first.
    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: DocumentId) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Replaces the body of a document only if it is still at `expected`.
    async fn compare_and_set(
        &self,
        collection: &str,
        id: DocumentId,
        expected: Version,
        body: serde_json::Value,
    ) -> Result<UpdateOutcome> {
        let update = ConditionalUpdate::new(move |current| {
            *current = body;
            Ok(())
        })
        .expect_version(expected);
        self.atomic_update(collection, id, update).await
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
