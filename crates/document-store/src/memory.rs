use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    ConditionalUpdate, Document, DocumentId, DocumentQuery, NewDocument, Result, StoreError,
    UpdateOutcome, Version, store::DocumentStore,
};

type Key = (String, DocumentId);

/// In-memory document store implementation for testing and local runs.
///
/// Conditional updates are evaluated and applied while holding the write
/// lock, which gives the same per-document atomicity as the PostgreSQL
/// implementation's row lock.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Key, Document>>>,
    failing_inserts: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Makes inserts into `collection` fail with `Unavailable` (or succeed
    /// again when `fail` is false).
    pub async fn set_fail_on_insert(&self, collection: &str, fail: bool) {
        let mut failing = self.failing_inserts.write().await;
        if fail {
            failing.insert(collection.to_string());
        } else {
            failing.remove(collection);
        }
    }

    /// Clears all documents.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection.to_string(), id)).cloned())
    }

    async fn insert(&self, document: NewDocument) -> Result<DocumentId> {
        if self
            .failing_inserts
            .read()
            .await
            .contains(&document.collection)
        {
            return Err(StoreError::Unavailable(format!(
                "inserts into {} are failing",
                document.collection
            )));
        }

        let mut documents = self.documents.write().await;
        let key = (document.collection.clone(), document.id);
        if documents.contains_key(&key) {
            return Err(StoreError::DuplicateDocument {
                collection: document.collection,
                id: document.id,
            });
        }

        let now = Utc::now();
        let id = document.id;
        documents.insert(
            key,
            Document {
                collection: document.collection,
                id,
                version: Version::first(),
                body: document.body,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn atomic_update(
        &self,
        collection: &str,
        id: DocumentId,
        update: ConditionalUpdate,
    ) -> Result<UpdateOutcome> {
        let mut documents = self.documents.write().await;
        let Some(current) = documents.get_mut(&(collection.to_string(), id)) else {
            return Ok(UpdateOutcome::NotFound);
        };

        if !update.is_satisfied_by(current) {
            return Ok(UpdateOutcome::PredicateFailed(current.clone()));
        }

        // Mutate a copy so a failing mutation leaves the stored body intact.
        let mut body = current.body.clone();
        update.apply(&mut body)?;

        current.body = body;
        current.version = current.version.next();
        current.updated_at = Utc::now();
        Ok(UpdateOutcome::Applied(current.clone()))
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<u64> {
        let mut documents = self.documents.write().await;
        Ok(documents
            .remove(&(collection.to_string(), id))
            .map_or(0, |_| 1))
    }

    async fn take(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(&(collection.to_string(), id)))
    }

    async fn find(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        let mut matching: Vec<_> = documents
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect();

        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}
