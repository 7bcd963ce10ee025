use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{DocumentId, Result};

/// Version stamp of a stored document, used for compare-and-set.
///
/// A freshly inserted document is at version 1 and every applied update
/// increments the stamp by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored document together with its bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Collection the document belongs to (e.g. "book").
    pub collection: String,

    /// Document identity within its collection.
    pub id: DocumentId,

    /// Current version stamp.
    pub version: Version,

    /// JSON body of the document.
    pub body: serde_json::Value,

    /// When the document was inserted.
    pub created_at: DateTime<Utc>,

    /// When the document was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserializes the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Returns a top-level body field, if present.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.body.get(name)
    }

    /// Returns a top-level body field as an unsigned integer.
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.field(name).and_then(serde_json::Value::as_u64)
    }
}

/// A document to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub collection: String,
    pub id: DocumentId,
    pub body: serde_json::Value,
}

impl NewDocument {
    /// Creates a new document from a raw JSON body.
    pub fn new(collection: impl Into<String>, id: DocumentId, body: serde_json::Value) -> Self {
        Self {
            collection: collection.into(),
            id,
            body,
        }
    }

    /// Creates a new document by serializing a typed value.
    pub fn from_serializable<T: Serialize>(
        collection: impl Into<String>,
        id: DocumentId,
        value: &T,
    ) -> Result<Self> {
        Ok(Self::new(collection, id, serde_json::to_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(Version::first() < Version::first().next());
        assert_eq!(Version::first().next(), Version::new(2));
        assert_eq!(Version::new(7).as_i64(), 7);
    }

    #[test]
    fn document_decodes_typed_body() {
        #[derive(Deserialize)]
        struct Counter {
            hits: u64,
        }

        let now = Utc::now();
        let doc = Document {
            collection: "counter".to_string(),
            id: DocumentId::new(),
            version: Version::first(),
            body: serde_json::json!({ "hits": 3 }),
            created_at: now,
            updated_at: now,
        };

        let counter: Counter = doc.decode().unwrap();
        assert_eq!(counter.hits, 3);
        assert_eq!(doc.u64_field("hits"), Some(3));
        assert_eq!(doc.u64_field("missing"), None);
    }

    #[test]
    fn new_document_from_serializable() {
        #[derive(Serialize)]
        struct Note<'a> {
            text: &'a str,
        }

        let id = DocumentId::new();
        let doc = NewDocument::from_serializable("note", id, &Note { text: "hi" }).unwrap();
        assert_eq!(doc.collection, "note");
        assert_eq!(doc.id, id);
        assert_eq!(doc.body["text"], "hi");
    }
}
