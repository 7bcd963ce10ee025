//! Rating aggregator: the only writer of a book's rating fields.

use chrono::Utc;
use document_store::{DocumentQuery, DocumentStore};
use domain::{
    Book, BookId, RatingChange, RatingSummary, Review, StarHistogram, Stars, collections,
};

use crate::cas::{bounded, update_with_retry};
use crate::config::EngineConfig;
use crate::error::Result;

/// Keeps `review_count`, `average_rating` and the star histogram of each
/// book in step with its reviews.
///
/// Each recomputation is a read-compute-write of the book guarded by
/// compare-and-set on its version; conflicts are retried with backoff and
/// reported as `Contention` once the retry policy is exhausted.
#[derive(Clone)]
pub struct RatingAggregator<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> RatingAggregator<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Applies one review's contribution to its book's rating.
    #[tracing::instrument(skip(self), fields(book_id = %book_id, op = change.op()))]
    pub async fn apply_review_delta(
        &self,
        book_id: BookId,
        change: RatingChange,
    ) -> Result<RatingSummary> {
        let (book, ()) = update_with_retry(
            &self.store,
            &self.config,
            collections::BOOK,
            book_id.document_id(),
            |book: &mut Book| {
                book.apply_rating(change, Utc::now());
                Ok(())
            },
        )
        .await?;

        metrics::counter!("rating_recomputations_total", "op" => change.op()).increment(1);
        tracing::info!(
            review_count = book.rating.review_count,
            average_rating = book.rating.average_rating,
            "rating recomputed"
        );
        Ok(book.rating)
    }

    /// Counts a newly created review.
    pub async fn record_review_created(&self, review: &Review) -> Result<RatingSummary> {
        self.apply_review_delta(review.book_id, review.insertion())
            .await
    }

    /// Moves an edited review from `before` to its current stars.
    ///
    /// Returns `None` without touching the book when the stars did not change.
    pub async fn record_review_updated(
        &self,
        before: Stars,
        review: &Review,
    ) -> Result<Option<RatingSummary>> {
        if before == review.stars {
            return Ok(None);
        }
        let change = RatingChange::Update {
            before,
            after: review.stars,
        };
        self.apply_review_delta(review.book_id, change)
            .await
            .map(Some)
    }

    /// Removes a deleted review's contribution.
    pub async fn record_review_deleted(&self, review: &Review) -> Result<RatingSummary> {
        self.apply_review_delta(review.book_id, review.deletion())
            .await
    }

    /// Recounts the book's rating from the reviews currently stored and
    /// writes the result, replacing whatever the aggregate held.
    ///
    /// Also clears pending markers left by edits or deletes that failed
    /// before reaching the book. Meant for a book with no review writes in
    /// flight.
    #[tracing::instrument(skip(self), fields(book_id = %book_id))]
    pub async fn rebuild(&self, book_id: BookId) -> Result<RatingSummary> {
        let docs = bounded(
            self.config.store_timeout,
            "find_reviews",
            self.store.find(
                DocumentQuery::new(collections::REVIEW).field_eq("book_id", book_id.to_string()),
            ),
        )
        .await?;

        let mut ratings = Vec::with_capacity(docs.len());
        let mut stuck = Vec::new();
        for doc in &docs {
            let review: Review = doc.decode()?;
            if review.is_settling() {
                stuck.push(review.id);
            }
            ratings.push(review.stars);
        }
        let summary = RatingSummary::from_histogram(StarHistogram::from_ratings(ratings));

        let (book, previous) = update_with_retry(
            &self.store,
            &self.config,
            collections::BOOK,
            book_id.document_id(),
            |book: &mut Book| {
                let previous = book.rating;
                book.replace_rating(summary, Utc::now());
                Ok(previous)
            },
        )
        .await?;

        for review_id in stuck {
            let (_, cleared): (Review, Option<RatingChange>) = update_with_retry(
                &self.store,
                &self.config,
                collections::REVIEW,
                review_id.document_id(),
                |review: &mut Review| Ok(review.finish_rating_change()),
            )
            .await?;
            tracing::warn!(%review_id, ?cleared, "cleared stale pending rating change");
        }

        metrics::counter!("rating_recomputations_total", "op" => "rebuild").increment(1);
        if previous.histogram != summary.histogram {
            tracing::warn!(
                previous_count = previous.review_count,
                rebuilt_count = summary.review_count,
                "rating aggregate was out of step with reviews"
            );
        } else {
            tracing::info!(review_count = summary.review_count, "rating rebuilt");
        }
        Ok(book.rating)
    }
}

#[cfg(test)]
mod tests {
    use document_store::{ConditionalUpdate, InMemoryDocumentStore, NewDocument};
    use domain::{BookListing, NewReview, ProfileId};

    use super::*;
    use crate::error::ConsistencyError;

    fn stars(value: u8) -> Stars {
        Stars::new(value).unwrap()
    }

    async fn seed_book(store: &InMemoryDocumentStore) -> BookId {
        let book = Book::list(
            BookId::new(),
            ProfileId::new(),
            BookListing::default(),
            1,
            Utc::now(),
        );
        store
            .insert(
                NewDocument::from_serializable(collections::BOOK, book.id.document_id(), &book)
                    .unwrap(),
            )
            .await
            .unwrap();
        book.id
    }

    async fn seed_review(store: &InMemoryDocumentStore, book_id: BookId, value: u8) -> Review {
        let review = Review::create(
            NewReview {
                book_id,
                profile_id: ProfileId::new(),
                stars: value,
                content: String::new(),
                images: vec![],
            },
            Utc::now(),
        )
        .unwrap();
        store
            .insert(
                NewDocument::from_serializable(
                    collections::REVIEW,
                    review.id.document_id(),
                    &review,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        review
    }

    #[tokio::test]
    async fn test_insert_insert_delete() {
        let store = InMemoryDocumentStore::new();
        let book_id = seed_book(&store).await;
        let aggregator = RatingAggregator::new(store.clone(), EngineConfig::default());

        let summary = aggregator
            .apply_review_delta(book_id, RatingChange::Insert { stars: stars(4) })
            .await
            .unwrap();
        assert_eq!(summary.review_count, 1);
        assert!((summary.average_rating - 4.0).abs() < 1e-9);

        let summary = aggregator
            .apply_review_delta(book_id, RatingChange::Insert { stars: stars(2) })
            .await
            .unwrap();
        assert_eq!(summary.review_count, 2);
        assert!((summary.average_rating - 3.0).abs() < 1e-9);

        let summary = aggregator
            .apply_review_delta(book_id, RatingChange::Delete { stars: stars(4) })
            .await
            .unwrap();
        assert_eq!(summary.review_count, 1);
        assert!((summary.average_rating - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unchanged_stars_skip_recompute() {
        let store = InMemoryDocumentStore::new();
        let book_id = seed_book(&store).await;
        let review = seed_review(&store, book_id, 3).await;
        let aggregator = RatingAggregator::new(store.clone(), EngineConfig::default());

        let result = aggregator
            .record_review_updated(stars(3), &review)
            .await
            .unwrap();
        assert_eq!(result, None);

        let doc = store
            .get(collections::BOOK, book_id.document_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.version, document_store::Version::first());
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let store = InMemoryDocumentStore::new();
        let aggregator = RatingAggregator::new(store, EngineConfig::default());

        let err = aggregator
            .apply_review_delta(BookId::new(), RatingChange::Insert { stars: stars(5) })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsistencyError::NotFound { collection: "book", .. }));
    }

    #[tokio::test]
    async fn test_rebuild_repairs_missed_recompute() {
        let store = InMemoryDocumentStore::new();
        let book_id = seed_book(&store).await;
        let other_book = seed_book(&store).await;
        for value in [5, 4, 4] {
            seed_review(&store, book_id, value).await;
        }
        seed_review(&store, other_book, 1).await;

        let aggregator = RatingAggregator::new(store.clone(), EngineConfig::default());
        let summary = aggregator.rebuild(book_id).await.unwrap();

        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.histogram.count(stars(4)), 2);
        assert!((summary.average_rating - 13.0 / 3.0).abs() < 1e-9);

        let book: Book = store
            .get(collections::BOOK, book_id.document_id())
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(book.rating, summary);
        assert_eq!(book.stocks_left, 1);
    }

    #[tokio::test]
    async fn test_rebuild_clears_stale_pending_marker() {
        let store = InMemoryDocumentStore::new();
        let book_id = seed_book(&store).await;
        let review = seed_review(&store, book_id, 2).await;
        let deletion = review.deletion();
        store
            .atomic_update(
                collections::REVIEW,
                review.id.document_id(),
                ConditionalUpdate::typed(move |r: &mut Review| r.begin_rating_change(deletion)),
            )
            .await
            .unwrap();

        let aggregator = RatingAggregator::new(store.clone(), EngineConfig::default());
        let summary = aggregator.rebuild(book_id).await.unwrap();
        assert_eq!(summary.review_count, 1);

        let stored: Review = store
            .get(collections::REVIEW, review.id.document_id())
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert!(!stored.is_settling());
    }
}
