use thiserror::Error;

use crate::DocumentId;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with the same id already exists in the collection.
    #[error("Document {id} already exists in collection {collection}")]
    DuplicateDocument { collection: String, id: DocumentId },

    /// The store refused or could not complete the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A conditional update's mutation refused the current document.
    #[error("Update rejected: {0}")]
    Rejected(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
