//! Typed identifiers for the documents in each collection.

use std::str::FromStr;

use common::{DocumentId, ParseDocumentIdError};
use serde::{Deserialize, Serialize};

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(DocumentId);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(DocumentId::new())
            }

            /// Returns the store-level document ID.
            pub fn document_id(&self) -> DocumentId {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseDocumentIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl From<DocumentId> for $name {
            fn from(id: DocumentId) -> Self {
                Self(id)
            }
        }

        impl From<$name> for DocumentId {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

document_id!(
    /// Identifier of a book listing.
    BookId
);

document_id!(
    /// Identifier of an order (one purchased line).
    OrderId
);

document_id!(
    /// Identifier of a review.
    ReviewId
);

document_id!(
    /// Identifier of a buyer or seller profile.
    ProfileId
);
