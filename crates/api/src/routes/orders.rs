//! Checkout and order status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use consistency::{BatchResult, OrderBatch, PaymentGateway, StatusUpdate};
use document_store::DocumentStore;
use domain::{Order, OrderId};

use super::AppState;
use crate::error::ApiError;

/// POST /orders - charge once for the batch, then persist and reserve each line.
///
/// Responds `201` whenever the charge went through; the body's `state` and
/// per-line `outcome` say which lines were fulfilled.
#[tracing::instrument(skip(state, payload))]
pub async fn place<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    payload: Result<Json<OrderBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchResult>), ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let Json(batch) = payload?;
    let result = state.engine.place_order_batch(batch).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let order_id: OrderId = id.parse()?;
    Ok(Json(state.engine.orders().get_order(order_id).await?))
}

/// PUT /orders/{id}/status - seller-driven status transition.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Order>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let order_id: OrderId = id.parse()?;
    let Json(update) = payload?;
    Ok(Json(
        state.engine.orders().update_status(order_id, update).await?,
    ))
}
