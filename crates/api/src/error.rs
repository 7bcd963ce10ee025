//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ParseDocumentIdError;
use consistency::ConsistencyError;
use document_store::StoreError;
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error raised by the consistency engine.
    Engine(ConsistencyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(err) => engine_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }
        metrics::counter!("api_errors_total", "status" => status.as_str().to_string())
            .increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn engine_error_to_response(err: ConsistencyError) -> (StatusCode, String) {
    let status = match &err {
        ConsistencyError::NotFound { .. } => StatusCode::NOT_FOUND,
        ConsistencyError::InsufficientStock { .. } | ConsistencyError::Contention { .. } => {
            StatusCode::CONFLICT
        }
        ConsistencyError::Validation(DomainError::InvalidTransition { .. }) => {
            StatusCode::CONFLICT
        }
        ConsistencyError::Validation(_) | ConsistencyError::InvalidBatch(_) => {
            StatusCode::BAD_REQUEST
        }
        ConsistencyError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
        ConsistencyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConsistencyError::Store(StoreError::DuplicateDocument { .. }) => StatusCode::CONFLICT,
        ConsistencyError::Store(_) | ConsistencyError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<ConsistencyError> for ApiError {
    fn from(err: ConsistencyError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Engine(ConsistencyError::Validation(err))
    }
}

impl From<ParseDocumentIdError> for ApiError {
    fn from(err: ParseDocumentIdError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use common::DocumentId;
    use consistency::PaymentError;
    use domain::OrderStatus;

    use super::*;

    fn status_of(err: ConsistencyError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let id = DocumentId::new();
        assert_eq!(
            status_of(ConsistencyError::NotFound {
                collection: "book",
                id
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ConsistencyError::InsufficientStock {
                book_id: id,
                requested: 2,
                available: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ConsistencyError::Contention {
                collection: "book",
                id,
                attempts: 5
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ConsistencyError::PaymentFailed(PaymentError::Declined(
                "card declined".into()
            ))),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(ConsistencyError::Timeout {
                operation: "reserve"
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(ConsistencyError::InvalidBatch("no lines".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(DomainError::InvalidStars(9))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DomainError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            })
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_bad_id_is_bad_request() {
        let err = "not-a-uuid".parse::<DocumentId>().unwrap_err();
        assert_eq!(
            ApiError::from(err).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
