//! HTTP API server for the marketplace consistency engine.
//!
//! Exposes books, reviews, checkout and order status over JSON, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::Uri;
use axum::routing::{get, post, put};
use consistency::{ConsistencyEngine, EngineConfig, InMemoryPaymentGateway, PaymentGateway};
use document_store::{DocumentStore, InMemoryDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use error::ApiError;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S, P>))
        .route("/books", post(routes::books::create::<S, P>))
        .route(
            "/books/{id}",
            get(routes::books::get::<S, P>).put(routes::books::update::<S, P>),
        )
        .route("/books/{id}/restock", post(routes::books::restock::<S, P>))
        .route("/books/{id}/reviews", get(routes::books::reviews::<S, P>))
        .route(
            "/books/{id}/rating/rebuild",
            post(routes::books::rebuild_rating::<S, P>),
        )
        .route("/orders", post(routes::orders::place::<S, P>))
        .route("/orders/{id}", get(routes::orders::get::<S, P>))
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<S, P>),
        )
        .route(
            "/profiles/{id}/orders",
            get(routes::profiles::buyer_orders::<S, P>),
        )
        .route(
            "/profiles/{id}/orders/waiting",
            get(routes::profiles::seller_orders::<S, P>),
        )
        .route("/reviews", post(routes::reviews::create::<S, P>))
        .route(
            "/reviews/{id}",
            get(routes::reviews::get::<S, P>)
                .put(routes::reviews::update::<S, P>)
                .delete(routes::reviews::delete::<S, P>),
        )
        .fallback(not_found)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {uri}"))
}

/// Creates application state around an engine built from its parts.
pub fn create_state<S, P>(
    store: S,
    gateway: P,
    config: EngineConfig,
    store_kind: &'static str,
) -> Arc<AppState<S, P>>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    Arc::new(AppState {
        engine: ConsistencyEngine::new(store, gateway, config),
        store_kind,
    })
}

/// Creates the default application state: an in-memory store, an in-memory
/// payment gateway and default engine settings.
pub fn create_default_state() -> Arc<AppState<InMemoryDocumentStore, InMemoryPaymentGateway>> {
    create_state(
        InMemoryDocumentStore::new(),
        InMemoryPaymentGateway::new(),
        EngineConfig::default(),
        "memory",
    )
}
