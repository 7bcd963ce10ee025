//! Review endpoints. Every write keeps the book's rating in step.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use consistency::PaymentGateway;
use document_store::DocumentStore;
use domain::{NewReview, Review, ReviewEdit, ReviewId};

use super::AppState;
use crate::error::ApiError;

/// POST /reviews
#[tracing::instrument(skip(state, payload))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(new) = payload?;
    let review = state.engine.reviews().create_review(new).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /reviews/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Review>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let review_id: ReviewId = id.parse()?;
    Ok(Json(state.engine.reviews().get_review(review_id).await?))
}

/// PUT /reviews/{id} - partial edit; absent fields are kept.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    payload: Result<Json<ReviewEdit>, JsonRejection>,
) -> Result<Json<Review>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let review_id: ReviewId = id.parse()?;
    let Json(edit) = payload?;
    Ok(Json(
        state.engine.reviews().update_review(review_id, edit).await?,
    ))
}

/// DELETE /reviews/{id} - returns the removed review.
#[tracing::instrument(skip(state))]
pub async fn delete<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Review>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let review_id: ReviewId = id.parse()?;
    Ok(Json(state.engine.reviews().delete_review(review_id).await?))
}
