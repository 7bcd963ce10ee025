//! Book document: listing, stock level and rating aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BookId, ProfileId};
use crate::money::Money;
use crate::rating::{RatingChange, RatingSummary};

/// Seller-editable fields of a book.
///
/// Nothing in here touches stock or ratings, so a listing update can be
/// applied to a book without going through the ledger or the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookListing {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub book_type: String,
    #[serde(default)]
    pub language: String,
    #[serde(default = "Money::zero")]
    pub price: Money,
    #[serde(default = "Money::zero")]
    pub selling_price: Money,
    #[serde(default)]
    pub delivery_time_days: u32,
}

/// Stock fields of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub stocks_left: u64,
    pub in_stock: bool,
}

/// A book as stored in the `book` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub seller_id: ProfileId,
    #[serde(flatten)]
    pub listing: BookListing,
    pub stocks_left: u64,
    pub in_stock: bool,
    #[serde(flatten)]
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Lists a new book with no reviews and `in_stock` derived from `stocks_left`.
    pub fn list(
        id: BookId,
        seller_id: ProfileId,
        listing: BookListing,
        stocks_left: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seller_id,
            listing,
            stocks_left,
            in_stock: stocks_left > 0,
            rating: RatingSummary::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if `quantity` copies can be taken.
    pub fn can_supply(&self, quantity: u64) -> bool {
        quantity <= self.stocks_left
    }

    /// Removes `quantity` copies. Callers check [`Book::can_supply`] first;
    /// the level never goes below zero regardless.
    pub fn take_stock(&mut self, quantity: u64, now: DateTime<Utc>) {
        self.stocks_left = self.stocks_left.saturating_sub(quantity);
        self.in_stock = self.stocks_left > 0;
        self.updated_at = now;
    }

    /// Adds `quantity` copies.
    pub fn add_stock(&mut self, quantity: u64, now: DateTime<Utc>) {
        self.stocks_left = self.stocks_left.saturating_add(quantity);
        self.in_stock = self.stocks_left > 0;
        self.updated_at = now;
    }

    pub fn stock_level(&self) -> StockLevel {
        StockLevel {
            stocks_left: self.stocks_left,
            in_stock: self.in_stock,
        }
    }

    /// Applies a review's contribution to the rating aggregate.
    pub fn apply_rating(&mut self, change: RatingChange, now: DateTime<Utc>) {
        self.rating = self.rating.apply(change);
        self.updated_at = now;
    }

    /// Replaces the rating aggregate wholesale (reconciliation).
    pub fn replace_rating(&mut self, rating: RatingSummary, now: DateTime<Utc>) {
        self.rating = rating;
        self.updated_at = now;
    }

    /// Replaces the listing fields only.
    pub fn update_listing(&mut self, listing: BookListing, now: DateTime<Utc>) {
        self.listing = listing;
        self.updated_at = now;
    }

    /// Returns true if the derived fields agree with their sources.
    pub fn is_consistent(&self) -> bool {
        self.in_stock == (self.stocks_left > 0) && self.rating.is_consistent()
    }
}
