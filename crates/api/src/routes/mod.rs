//! HTTP route handlers.

pub mod books;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod profiles;
pub mod reviews;

use consistency::ConsistencyEngine;

/// Shared application state accessible from all handlers.
pub struct AppState<S, P> {
    pub engine: ConsistencyEngine<S, P>,
    /// Which document store backs the engine, reported by `/health`.
    pub store_kind: &'static str,
}
