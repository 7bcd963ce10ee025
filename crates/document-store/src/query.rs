use serde_json::{Map, Value};

use crate::Document;

/// Builder for field-equality lookups within one collection.
///
/// Filters compare top-level body fields for equality; all filters
/// must match. Results are ordered by insertion time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Top-level field equality filters.
    pub filters: Vec<(String, Value)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query matching every document in `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Requires `field` to equal `value`.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `document` satisfies this query.
    pub fn matches(&self, document: &Document) -> bool {
        document.collection == self.collection
            && self
                .filters
                .iter()
                .all(|(field, value)| document.field(field) == Some(value))
    }

    /// Returns the filters as a JSON object, suitable for containment checks.
    pub fn filter_object(&self) -> Value {
        let map: Map<String, Value> = self.filters.iter().cloned().collect();
        Value::Object(map)
    }
}
