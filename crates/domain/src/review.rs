//! Review document and the rating change each mutation implies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{BookId, ProfileId, ReviewId};
use crate::rating::{RatingChange, Stars};

/// Request to review a book. Stars are validated by [`Review::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub book_id: BookId,
    pub profile_id: ProfileId,
    pub stars: u8,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial edit of a review; absent fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReviewEdit {
    #[serde(default)]
    pub stars: Option<u8>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// A review as stored in the `review` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub book_id: BookId,
    pub profile_id: ProfileId,
    pub stars: Stars,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Rating change written to this review but not yet applied to its book.
    /// Set while an edit or delete is in flight; other edits and deletes
    /// wait until it clears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_rating: Option<RatingChange>,
}

impl Review {
    /// Builds a review from a request, rejecting invalid stars.
    pub fn create(new: NewReview, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Ok(Self {
            id: ReviewId::new(),
            book_id: new.book_id,
            profile_id: new.profile_id,
            stars: Stars::new(new.stars)?,
            content: new.content,
            images: new.images,
            created_at: now,
            updated_at: now,
            pending_rating: None,
        })
    }

    /// The change creating this review makes to its book.
    pub fn insertion(&self) -> RatingChange {
        RatingChange::Insert { stars: self.stars }
    }

    /// The change deleting this review makes to its book.
    pub fn deletion(&self) -> RatingChange {
        RatingChange::Delete { stars: self.stars }
    }

    /// True while a rating change is waiting to reach the book.
    pub fn is_settling(&self) -> bool {
        self.pending_rating.is_some()
    }

    /// Records `change` as in flight.
    pub fn begin_rating_change(&mut self, change: RatingChange) {
        self.pending_rating = Some(change);
    }

    /// Clears the in-flight marker once the book has the change.
    pub fn finish_rating_change(&mut self) -> Option<RatingChange> {
        self.pending_rating.take()
    }

    /// Applies `edit`. Returns the rating change only if the stars moved.
    pub fn apply_edit(
        &mut self,
        edit: ReviewEdit,
        now: DateTime<Utc>,
    ) -> Result<Option<RatingChange>, DomainError> {
        let after = edit.stars.map(Stars::new).transpose()?;

        let change = match after {
            Some(after) if after != self.stars => {
                let before = self.stars;
                self.stars = after;
                Some(RatingChange::Update { before, after })
            }
            _ => None,
        };
        if let Some(content) = edit.content {
            self.content = content;
        }
        if let Some(images) = edit.images {
            self.images = images;
        }
        self.updated_at = now;
        Ok(change)
    }
}
