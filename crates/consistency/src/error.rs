//! Consistency engine error types.

use common::DocumentId;
use document_store::StoreError;
use domain::DomainError;
use thiserror::Error;

use crate::payment::PaymentError;

/// Errors that can occur in the consistency engine.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    /// The referenced document does not exist.
    #[error("{collection} not found: {id}")]
    NotFound {
        collection: &'static str,
        id: DocumentId,
    },

    /// The book does not have enough copies left.
    #[error("Insufficient stock for book {book_id}: requested {requested}, available {available}")]
    InsufficientStock {
        book_id: DocumentId,
        requested: u64,
        available: u64,
    },

    /// Compare-and-set kept losing to concurrent writers.
    #[error("Contention on {collection} {id}: gave up after {attempts} attempts")]
    Contention {
        collection: &'static str,
        id: DocumentId,
        attempts: u32,
    },

    /// A store or gateway call did not finish in time. It may or may not
    /// have been applied.
    #[error("Timed out during {operation}")]
    Timeout { operation: &'static str },

    /// The charge was declined or the gateway failed. Nothing was persisted.
    #[error("Payment failed: {0}")]
    PaymentFailed(#[from] PaymentError),

    /// The request was rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// The order batch itself is malformed.
    #[error("Invalid order batch: {0}")]
    InvalidBatch(String),

    /// Document store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document could not be decoded or encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConsistencyError {
    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConsistencyError::Contention { .. } | ConsistencyError::Timeout { .. }
        )
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, ConsistencyError>;
