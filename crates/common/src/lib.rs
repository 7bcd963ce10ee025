//! Shared types for the marketplace consistency engine.

mod types;

pub use types::{DocumentId, ParseDocumentIdError};
