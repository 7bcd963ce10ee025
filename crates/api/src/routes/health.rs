//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub version: &'static str,
}

/// GET /health - liveness plus the backing store kind.
pub async fn check<S, P>(State(state): State<Arc<AppState<S, P>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store: state.store_kind,
        version: env!("CARGO_PKG_VERSION"),
    })
}
