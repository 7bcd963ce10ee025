//! Conditional updates: a predicate and a mutation applied as one unit.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Document, Result, StoreError, Version};

type Predicate = Box<dyn Fn(&Document) -> bool + Send + Sync>;
type Mutation = Box<dyn FnOnce(&mut serde_json::Value) -> Result<()> + Send + Sync>;

/// An update that is applied only if its conditions hold.
///
/// Stores evaluate the conditions and apply the mutation indivisibly with
/// respect to other updates of the same document. Two kinds of condition
/// can be combined:
///
/// - an expected [`Version`] (compare-and-set)
/// - an arbitrary predicate over the current document
pub struct ConditionalUpdate {
    expected_version: Option<Version>,
    predicate: Option<Predicate>,
    mutation: Mutation,
}

impl ConditionalUpdate {
    /// Creates an unconditional update from a mutation of the raw body.
    pub fn new<F>(mutation: F) -> Self
    where
        F: FnOnce(&mut serde_json::Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            expected_version: None,
            predicate: None,
            mutation: Box::new(mutation),
        }
    }

    /// Creates an update that decodes the body as `T`, mutates it, and
    /// writes it back.
    pub fn typed<T, F>(mutation: F) -> Self
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) + Send + Sync + 'static,
    {
        Self::new(move |body| {
            let mut value: T = serde_json::from_value(body.clone())?;
            mutation(&mut value);
            *body = serde_json::to_value(&value)?;
            Ok(())
        })
    }

    /// Like [`ConditionalUpdate::typed`], for mutations that can refuse.
    /// A refusal surfaces as [`StoreError::Rejected`] and nothing is written.
    pub fn try_typed<T, E, F>(mutation: F) -> Self
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce(&mut T) -> std::result::Result<(), E> + Send + Sync + 'static,
    {
        Self::new(move |body| {
            let mut value: T = serde_json::from_value(body.clone())?;
            mutation(&mut value).map_err(|e| StoreError::Rejected(e.to_string()))?;
            *body = serde_json::to_value(&value)?;
            Ok(())
        })
    }

    /// Only apply if the document is still at `version`.
    pub fn expect_version(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Only apply if `predicate` holds for the current document.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Returns the expected version, if this is a compare-and-set.
    pub fn expected_version(&self) -> Option<Version> {
        self.expected_version
    }

    /// Returns true if every condition holds for `document`.
    pub fn is_satisfied_by(&self, document: &Document) -> bool {
        if let Some(expected) = self.expected_version
            && document.version != expected
        {
            return false;
        }
        self.predicate
            .as_ref()
            .is_none_or(|predicate| predicate(document))
    }

    /// Applies the mutation to `body`.
    pub fn apply(self, body: &mut serde_json::Value) -> Result<()> {
        (self.mutation)(body)
    }
}

impl std::fmt::Debug for ConditionalUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalUpdate")
            .field("expected_version", &self.expected_version)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The conditions held and the mutation was written. Carries the
    /// document as stored after the update.
    Applied(Document),

    /// A condition did not hold; nothing was written. Carries the
    /// document as it currently is.
    PredicateFailed(Document),

    /// No document with that id exists in the collection.
    NotFound,
}

impl UpdateOutcome {
    /// Returns true if the update was written.
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}
