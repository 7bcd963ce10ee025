//! Star ratings and the per-book rating aggregate.
//!
//! The aggregate is always derived from the histogram: the review count is
//! the histogram total and the average is `Σ star * count / total`. Nothing
//! is adjusted incrementally, so repeated edits cannot accumulate
//! floating-point drift.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    /// All valid ratings, lowest first.
    pub const ALL: [Stars; 5] = [Stars(1), Stars(2), Stars(3), Stars(4), Stars(5)];

    /// Creates a rating, rejecting values outside 1..=5.
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidStars(value))
        }
    }

    /// Returns the numeric rating.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Stars {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Stars> for u8 {
    fn from(stars: Stars) -> Self {
        stars.0
    }
}

impl std::fmt::Display for Stars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review counts per star rating, persisted as `one_star` .. `five_star`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StarHistogram {
    #[serde(default)]
    pub one_star: u64,
    #[serde(default)]
    pub two_star: u64,
    #[serde(default)]
    pub three_star: u64,
    #[serde(default)]
    pub four_star: u64,
    #[serde(default)]
    pub five_star: u64,
}

impl StarHistogram {
    /// Builds a histogram from a sequence of ratings.
    pub fn from_ratings(ratings: impl IntoIterator<Item = Stars>) -> Self {
        let mut histogram = Self::default();
        for stars in ratings {
            histogram.add(stars);
        }
        histogram
    }

    fn bucket_mut(&mut self, stars: Stars) -> &mut u64 {
        match stars.0 {
            1 => &mut self.one_star,
            2 => &mut self.two_star,
            3 => &mut self.three_star,
            4 => &mut self.four_star,
            _ => &mut self.five_star,
        }
    }

    /// Returns the number of reviews with the given rating.
    pub fn count(&self, stars: Stars) -> u64 {
        match stars.0 {
            1 => self.one_star,
            2 => self.two_star,
            3 => self.three_star,
            4 => self.four_star,
            _ => self.five_star,
        }
    }

    /// Counts one more review with `stars`.
    pub fn add(&mut self, stars: Stars) {
        *self.bucket_mut(stars) += 1;
    }

    /// Removes one review with `stars`; an empty bucket stays at zero.
    pub fn remove(&mut self, stars: Stars) {
        let bucket = self.bucket_mut(stars);
        *bucket = bucket.saturating_sub(1);
    }

    /// Total number of reviews.
    pub fn total(&self) -> u64 {
        Stars::ALL.iter().map(|s| self.count(*s)).sum()
    }

    /// Sum of `star * count` over all buckets.
    pub fn weighted_sum(&self) -> u64 {
        Stars::ALL
            .iter()
            .map(|s| u64::from(s.value()) * self.count(*s))
            .sum()
    }

    /// Average rating, or 0 when there are no reviews.
    pub fn average(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.weighted_sum() as f64 / total as f64,
        }
    }
}

/// A review's net contribution to its book's rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RatingChange {
    /// A review was created.
    Insert { stars: Stars },

    /// A review's rating was edited.
    Update { before: Stars, after: Stars },

    /// A review was deleted.
    Delete { stars: Stars },
}

impl RatingChange {
    /// Short operation name for logs and metrics labels.
    pub fn op(&self) -> &'static str {
        match self {
            RatingChange::Insert { .. } => "insert",
            RatingChange::Update { .. } => "update",
            RatingChange::Delete { .. } => "delete",
        }
    }
}

/// The rating fields stored on a book.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(flatten)]
    pub histogram: StarHistogram,
}

impl RatingSummary {
    /// Derives count and average from a histogram.
    pub fn from_histogram(histogram: StarHistogram) -> Self {
        Self {
            review_count: histogram.total(),
            average_rating: histogram.average(),
            histogram,
        }
    }

    /// Returns the summary after applying `change`.
    ///
    /// An update is a removal of `before` followed by an insertion of
    /// `after` against the same snapshot, so the count is unchanged.
    pub fn apply(&self, change: RatingChange) -> Self {
        let mut histogram = self.histogram;
        match change {
            RatingChange::Insert { stars } => histogram.add(stars),
            RatingChange::Update { before, after } => {
                histogram.remove(before);
                histogram.add(after);
            }
            RatingChange::Delete { stars } => histogram.remove(stars),
        }
        Self::from_histogram(histogram)
    }

    /// Returns true if count and average agree with the histogram.
    pub fn is_consistent(&self) -> bool {
        self.review_count == self.histogram.total()
            && (self.average_rating - self.histogram.average()).abs() < 1e-9
    }
}
