//! Per-profile order listings.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use consistency::PaymentGateway;
use document_store::DocumentStore;
use domain::{DomainError, Order, OrderStatus, ProfileId};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

/// `?status=PENDING,IN_PROGRESS`; absent or empty means every status.
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    pub fn statuses(&self) -> Result<Vec<OrderStatus>, DomainError> {
        self.status
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

/// GET /profiles/{id}/orders - orders the profile bought.
#[tracing::instrument(skip(state))]
pub async fn buyer_orders<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Order>>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let profile_id: ProfileId = id.parse()?;
    let statuses = filter.statuses()?;
    Ok(Json(
        state
            .engine
            .orders()
            .orders_for_buyer(profile_id, &statuses)
            .await?,
    ))
}

/// GET /profiles/{id}/orders/waiting - orders waiting on the profile as seller.
#[tracing::instrument(skip(state))]
pub async fn seller_orders<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(id): Path<String>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Order>>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    P: PaymentGateway + 'static,
{
    let profile_id: ProfileId = id.parse()?;
    let statuses = filter.statuses()?;
    Ok(Json(
        state
            .engine
            .orders()
            .orders_for_seller(profile_id, &statuses)
            .await?,
    ))
}
