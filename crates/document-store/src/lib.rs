//! Document store for the marketplace consistency engine.
//!
//! Documents live in named collections, keyed by [`DocumentId`], and carry a
//! [`Version`] stamp that is bumped on every applied update. The
//! [`DocumentStore`] trait exposes the primitives the consistency engine
//! relies on:
//!
//! - atomic conditional updates (predicate + mutation applied indivisibly)
//! - compare-and-set on the version stamp
//! - plain insert, get, delete and field-equality lookups

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod update;

pub use common::DocumentId;
pub use document::{Document, NewDocument, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::DocumentQuery;
pub use store::{DocumentStore, DocumentStoreExt};
pub use update::{ConditionalUpdate, UpdateOutcome};
