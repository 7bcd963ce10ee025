//! Cross-entity consistency engine for the marketplace.
//!
//! Three components keep the denormalised fields of a book correct under
//! concurrent requests, using only the store's per-document atomic
//! primitives:
//!
//! 1. [`InventoryLedger`] - conditional stock decrement, `in_stock` derived
//! 2. [`RatingAggregator`] - histogram-based rating recomputation under
//!    compare-and-set with bounded retries
//! 3. [`FulfillmentCoordinator`] - payment, then order persistence, then
//!    per-line reservation, with structured per-line results
//!
//! [`ReviewService`], [`BookCatalog`] and [`OrderService`] are the request
//! handlers around them, and [`ConsistencyEngine`] wires everything to one
//! store and payment gateway.

mod cas;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod orders;
pub mod payment;
pub mod rating;
pub mod reviews;
pub mod state;

pub use catalog::{BookCatalog, NewBook};
pub use config::{EngineConfig, RetryPolicy};
pub use engine::ConsistencyEngine;
pub use error::{ConsistencyError, Result};
pub use fulfillment::{FulfillmentCoordinator, OrderBatch};
pub use inventory::InventoryLedger;
pub use orders::{OrderService, StatusUpdate};
pub use payment::{ChargeId, ChargeRequest, InMemoryPaymentGateway, PaymentError, PaymentGateway};
pub use rating::RatingAggregator;
pub use reviews::ReviewService;
pub use state::{BatchResult, FulfillmentState, LineOutcome, LineResult};
