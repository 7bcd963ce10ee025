//! Book listing, restock and rating endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use consistency::{NewBook, PaymentGateway};
use document_store::DocumentStore;
use domain::{Book, BookId, BookListing, RatingSummary, Review, StockLevel};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// POST /books - list a new book with its initial stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    payload: Result<Json<NewBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(new) = payload?;
    let book = state.engine.catalog().create_book(new).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// GET /books/{id} - the book with its stock and rating fields.
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let book_id: BookId = id.parse()?;
    Ok(Json(state.engine.catalog().get_book(book_id).await?))
}

/// PUT /books/{id} - replace the listing fields. Stock and rating are untouched.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    payload: Result<Json<BookListing>, JsonRejection>,
) -> Result<Json<Book>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let book_id: BookId = id.parse()?;
    let Json(listing) = payload?;
    Ok(Json(
        state.engine.catalog().update_listing(book_id, listing).await?,
    ))
}

/// POST /books/{id}/restock
#[tracing::instrument(skip(state, payload))]
pub async fn restock<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    payload: Result<Json<RestockRequest>, JsonRejection>,
) -> Result<Json<StockLevel>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let book_id: BookId = id.parse()?;
    let Json(req) = payload?;
    Ok(Json(
        state.engine.ledger().restock(book_id, req.quantity).await?,
    ))
}

/// GET /books/{id}/reviews
#[tracing::instrument(skip(state))]
pub async fn reviews<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let book_id: BookId = id.parse()?;
    // 404 for an unknown book rather than an empty list.
    state.engine.catalog().get_book(book_id).await?;
    Ok(Json(state.engine.reviews().reviews_for_book(book_id).await?))
}

/// POST /books/{id}/rating/rebuild - recount the rating from stored reviews.
#[tracing::instrument(skip(state))]
pub async fn rebuild_rating<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<RatingSummary>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let book_id: BookId = id.parse()?;
    Ok(Json(state.engine.rebuild_rating(book_id).await?))
}
