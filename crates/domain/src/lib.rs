//! Domain layer for the marketplace consistency engine.
//!
//! This crate provides the documents the engine reads and writes, and the
//! pure rules over them:
//! - Book with its stock level and rating aggregate
//! - Star histogram and rating recomputation
//! - Order with its status state machine
//! - Review with its rating contribution

pub mod book;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod rating;
pub mod review;

pub use book::{Book, BookListing, StockLevel};
pub use error::DomainError;
pub use ids::{BookId, OrderId, ProfileId, ReviewId};
pub use money::Money;
pub use order::{DeliveryDetails, Order, OrderLine, OrderStatus};
pub use rating::{RatingChange, RatingSummary, StarHistogram, Stars};
pub use review::{NewReview, Review, ReviewEdit};

/// Collection names used in the document store.
pub mod collections {
    /// Books, the aggregate root for stock and ratings.
    pub const BOOK: &str = "book";

    /// Orders, one per purchased line.
    pub const ORDER: &str = "order";

    /// Reviews, one per profile and book.
    pub const REVIEW: &str = "review";
}
