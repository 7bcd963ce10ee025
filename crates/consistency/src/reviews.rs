//! Review persistence kept in step with the rating aggregate.

use chrono::Utc;
use document_store::{DocumentQuery, DocumentStore, DocumentStoreExt, NewDocument};
use domain::{BookId, NewReview, RatingChange, Review, ReviewEdit, ReviewId, collections};

use crate::cas::{Step, bounded, update_when_ready, update_with_retry};
use crate::config::EngineConfig;
use crate::error::{ConsistencyError, Result};
use crate::rating::RatingAggregator;

/// Creates, edits and deletes reviews, triggering exactly one rating
/// recomputation per mutation.
///
/// The review document is written first. If the recomputation then fails
/// (contention, timeout) the error is returned. An edit or delete that fails
/// this way leaves its pending marker on the review, which blocks further
/// edits until [`RatingAggregator::rebuild`] repairs the book.
#[derive(Clone)]
pub struct ReviewService<S> {
    store: S,
    ratings: RatingAggregator<S>,
    config: EngineConfig,
}

impl<S> ReviewService<S>
where
    S: DocumentStore + Clone,
{
    pub fn new(store: S, config: EngineConfig) -> Self {
        let ratings = RatingAggregator::new(store.clone(), config.clone());
        Self {
            store,
            ratings,
            config,
        }
    }

    /// Stores a new review and counts it in the book's rating.
    #[tracing::instrument(skip(self, new), fields(book_id = %new.book_id, stars = new.stars))]
    pub async fn create_review(&self, new: NewReview) -> Result<Review> {
        let review = Review::create(new, Utc::now())?;

        let book_exists = bounded(
            self.config.store_timeout,
            "get_book",
            self.store
                .exists(collections::BOOK, review.book_id.document_id()),
        )
        .await?;
        if !book_exists {
            return Err(ConsistencyError::NotFound {
                collection: collections::BOOK,
                id: review.book_id.document_id(),
            });
        }

        let document =
            NewDocument::from_serializable(collections::REVIEW, review.id.document_id(), &review)?;
        bounded(
            self.config.store_timeout,
            "insert_review",
            self.store.insert(document),
        )
        .await?;
        tracing::info!(review_id = %review.id, "review created");

        self.ratings.record_review_created(&review).await?;
        Ok(review)
    }

    /// Edits a review. The book is recomputed only when the stars changed.
    ///
    /// A star change is written to the review together with a pending
    /// marker, applied to the book, then the marker is cleared. While the
    /// marker is set, other edits and deletes of the same review wait.
    #[tracing::instrument(skip(self, edit), fields(review_id = %review_id))]
    pub async fn update_review(&self, review_id: ReviewId, edit: ReviewEdit) -> Result<Review> {
        let (review, change): (Review, Option<RatingChange>) = update_when_ready(
            &self.store,
            &self.config,
            collections::REVIEW,
            review_id.document_id(),
            |review: &mut Review| {
                if review.is_settling() {
                    return Ok(Step::Wait);
                }
                let change = review.apply_edit(edit.clone(), Utc::now())?;
                if let Some(change) = change {
                    review.begin_rating_change(change);
                }
                Ok(Step::Write(change))
            },
        )
        .await?;

        let Some(change) = change else {
            tracing::info!("review updated, rating unchanged");
            return Ok(review);
        };
        tracing::info!(stars_after = %review.stars, "review updated");

        self.ratings
            .apply_review_delta(review.book_id, change)
            .await?;
        self.finish_rating_change(review_id).await
    }

    /// Deletes a review and removes it from the book's rating.
    ///
    /// The review is first marked as leaving, so no edit can slip in
    /// between the book update and the removal. Only the caller that
    /// placed the marker goes on; a concurrent second delete gets
    /// `NotFound`.
    #[tracing::instrument(skip(self), fields(review_id = %review_id))]
    pub async fn delete_review(&self, review_id: ReviewId) -> Result<Review> {
        let (review, change): (Review, RatingChange) = update_when_ready(
            &self.store,
            &self.config,
            collections::REVIEW,
            review_id.document_id(),
            |review: &mut Review| {
                if review.is_settling() {
                    return Ok(Step::Wait);
                }
                let change = review.deletion();
                review.begin_rating_change(change);
                Ok(Step::Write(change))
            },
        )
        .await?;

        self.ratings
            .apply_review_delta(review.book_id, change)
            .await?;

        let removed = bounded(
            self.config.store_timeout,
            "delete_review",
            self.store.take(collections::REVIEW, review_id.document_id()),
        )
        .await?
        .ok_or(ConsistencyError::NotFound {
            collection: collections::REVIEW,
            id: review_id.document_id(),
        })?;

        let mut review: Review = removed.decode()?;
        review.finish_rating_change();
        tracing::info!(book_id = %review.book_id, stars = %review.stars, "review deleted");
        Ok(review)
    }

    async fn finish_rating_change(&self, review_id: ReviewId) -> Result<Review> {
        let (review, ()) = update_with_retry(
            &self.store,
            &self.config,
            collections::REVIEW,
            review_id.document_id(),
            |review: &mut Review| {
                review.finish_rating_change();
                Ok(())
            },
        )
        .await?;
        Ok(review)
    }

    pub async fn get_review(&self, review_id: ReviewId) -> Result<Review> {
        let doc = bounded(
            self.config.store_timeout,
            "get_review",
            self.store.get(collections::REVIEW, review_id.document_id()),
        )
        .await?
        .ok_or(ConsistencyError::NotFound {
            collection: collections::REVIEW,
            id: review_id.document_id(),
        })?;
        Ok(doc.decode()?)
    }

    /// Lists a book's reviews, oldest first.
    pub async fn reviews_for_book(&self, book_id: BookId) -> Result<Vec<Review>> {
        let docs = bounded(
            self.config.store_timeout,
            "find_reviews",
            self.store.find(
                DocumentQuery::new(collections::REVIEW).field_eq("book_id", book_id.to_string()),
            ),
        )
        .await?;

        docs.iter()
            .map(|doc| doc.decode().map_err(ConsistencyError::from))
            .collect()
    }

    /// The aggregator this service reports to.
    pub fn ratings(&self) -> &RatingAggregator<S> {
        &self.ratings
    }
}
