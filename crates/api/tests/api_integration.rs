//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::routes::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use consistency::{EngineConfig, InMemoryPaymentGateway};
use document_store::InMemoryDocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

type State = Arc<AppState<InMemoryDocumentStore, InMemoryPaymentGateway>>;

fn setup() -> axum::Router {
    api::create_app(api::create_default_state(), get_metrics_handle())
}

fn setup_with_gateway() -> (axum::Router, InMemoryPaymentGateway) {
    let gateway = InMemoryPaymentGateway::new();
    let state: State = api::create_state(
        InMemoryDocumentStore::new(),
        gateway.clone(),
        EngineConfig::default(),
        "memory",
    );
    (api::create_app(state, get_metrics_handle()), gateway)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_book(app: &axum::Router, stocks_left: u64) -> Value {
    let (status, book) = send(
        app,
        "POST",
        "/books",
        Some(json!({
            "seller_id": domain::ProfileId::new(),
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "selling_price": 45000,
            "stocks_left": stocks_left,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    book
}

fn line(book: &Value, quantity: u32) -> Value {
    json!({
        "book_id": book["id"],
        "seller_id": book["seller_id"],
        "quantity": quantity,
        "amount": 45000,
    })
}

async fn create_review(app: &axum::Router, book: &Value, stars: u8) -> Value {
    let (status, review) = send(
        app,
        "POST",
        "/reviews",
        Some(json!({
            "book_id": book["id"],
            "profile_id": domain::ProfileId::new(),
            "stars": stars,
            "content": "worth it",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    review
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
}

#[tokio::test]
async fn test_create_and_get_book() {
    let app = setup();
    let book = create_book(&app, 3).await;

    assert_eq!(book["stocks_left"], 3);
    assert_eq!(book["in_stock"], true);
    assert_eq!(book["review_count"], 0);

    let uri = format!("/books/{}", book["id"].as_str().unwrap());
    let (status, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "The Left Hand of Darkness");
}

#[tokio::test]
async fn test_update_listing_keeps_stock() {
    let app = setup();
    let book = create_book(&app, 2).await;
    let uri = format!("/books/{}", book["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({ "title": "The Dispossessed", "selling_price": 39900 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "The Dispossessed");
    assert_eq!(updated["stocks_left"], 2);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/books/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let app = setup();
    let uri = format!("/books/{}", domain::BookId::new());
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = setup();
    let (status, json) = send(&app, "POST", "/books", Some(json!({ "title": 7 }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_restock_sets_in_stock() {
    let app = setup();
    let book = create_book(&app, 0).await;
    assert_eq!(book["in_stock"], false);

    let uri = format!("/books/{}/restock", book["id"].as_str().unwrap());
    let (status, level) = send(&app, "POST", &uri, Some(json!({ "quantity": 4 }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["stocks_left"], 4);
    assert_eq!(level["in_stock"], true);
}

#[tokio::test]
async fn test_order_batch_with_out_of_stock_line() {
    let app = setup();
    let plenty = create_book(&app, 5).await;
    let scarce = create_book(&app, 1).await;

    let buyer = domain::ProfileId::new();
    let (status, result) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "buyer_id": buyer,
            "payment_token": "tok_visa",
            "lines": [line(&plenty, 2), line(&scarce, 3)],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(result["state"], "PARTIALLY_FULFILLED");
    assert_eq!(result["amount"], 90000);
    assert_eq!(result["lines"][0]["outcome"], "FULFILLED");
    assert_eq!(result["lines"][1]["outcome"], "STOCK_UNAVAILABLE");
    assert_eq!(result["lines"][1]["available"], 1);

    let order_uri = format!("/orders/{}", result["lines"][1]["order_id"].as_str().unwrap());
    let (_, order) = send(&app, "GET", &order_uri, None).await;
    assert_eq!(order["status"], "STOCK_UNAVAILABLE");

    let book_uri = format!("/books/{}", plenty["id"].as_str().unwrap());
    let (_, book) = send(&app, "GET", &book_uri, None).await;
    assert_eq!(book["stocks_left"], 3);

    let buyer_uri = format!("/profiles/{buyer}/orders?status=PENDING");
    let (status, pending) = send(&app, "GET", &buyer_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let seller_uri = format!(
        "/profiles/{}/orders/waiting",
        scarce["seller_id"].as_str().unwrap()
    );
    let (_, waiting) = send(&app, "GET", &seller_uri, None).await;
    assert_eq!(waiting.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_declined_payment_persists_nothing() {
    let (app, gateway) = setup_with_gateway();
    let book = create_book(&app, 5).await;
    gateway.set_decline(true);

    let buyer = domain::ProfileId::new();
    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "buyer_id": buyer,
            "payment_token": "tok_visa",
            "lines": [line(&book, 1)],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(json["error"].as_str().unwrap().contains("declined"));

    let (_, orders) = send(&app, "GET", &format!("/profiles/{buyer}/orders"), None).await;
    assert!(orders.as_array().unwrap().is_empty());

    let (_, fetched) = send(
        &app,
        "GET",
        &format!("/books/{}", book["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(fetched["stocks_left"], 5);
}

#[tokio::test]
async fn test_empty_batch_is_bad_request() {
    let (app, gateway) = setup_with_gateway();
    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "buyer_id": domain::ProfileId::new(),
            "payment_token": "tok_visa",
            "lines": [],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gateway.charge_count(), 0);
}

#[tokio::test]
async fn test_order_status_transitions() {
    let app = setup();
    let book = create_book(&app, 1).await;
    let (_, result) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "buyer_id": domain::ProfileId::new(),
            "payment_token": "tok_visa",
            "lines": [line(&book, 1)],
        })),
    )
    .await;
    let uri = format!(
        "/orders/{}/status",
        result["lines"][0]["order_id"].as_str().unwrap()
    );

    let (status, order) = send(&app, "PUT", &uri, Some(json!({ "status": "IN_PROGRESS" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "IN_PROGRESS");

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "status": "PENDING" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_status_filter_is_bad_request() {
    let app = setup();
    let uri = format!("/profiles/{}/orders?status=LOST", domain::ProfileId::new());
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_lifecycle_keeps_rating() {
    let app = setup();
    let book = create_book(&app, 1).await;
    let book_uri = format!("/books/{}", book["id"].as_str().unwrap());

    let first = create_review(&app, &book, 4).await;
    create_review(&app, &book, 2).await;

    let (_, fetched) = send(&app, "GET", &book_uri, None).await;
    assert_eq!(fetched["review_count"], 2);
    assert_eq!(fetched["average_rating"], 3.0);

    let review_uri = format!("/reviews/{}", first["id"].as_str().unwrap());
    let (status, edited) = send(&app, "PUT", &review_uri, Some(json!({ "stars": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["stars"], 5);
    assert_eq!(edited["content"], "worth it");

    let (_, fetched) = send(&app, "GET", &book_uri, None).await;
    assert_eq!(fetched["average_rating"], 3.5);
    assert_eq!(fetched["five_star"], 1);
    assert_eq!(fetched["four_star"], 0);

    let (status, _) = send(&app, "DELETE", &review_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &review_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, fetched) = send(&app, "GET", &book_uri, None).await;
    assert_eq!(fetched["review_count"], 1);
    assert_eq!(fetched["average_rating"], 2.0);

    let (_, reviews) = send(&app, "GET", &format!("{book_uri}/reviews"), None).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);

    let (status, summary) = send(&app, "POST", &format!("{book_uri}/rating/rebuild"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["review_count"], 1);
    assert_eq!(summary["two_star"], 1);
}

#[tokio::test]
async fn test_invalid_stars_are_rejected() {
    let app = setup();
    let book = create_book(&app, 1).await;
    let (status, _) = send(
        &app,
        "POST",
        "/reviews",
        Some(json!({
            "book_id": book["id"],
            "profile_id": domain::ProfileId::new(),
            "stars": 6,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, fetched) = send(
        &app,
        "GET",
        &format!("/books/{}", book["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(fetched["review_count"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("/nowhere"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let book = create_book(&app, 1).await;
    send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "buyer_id": domain::ProfileId::new(),
            "payment_token": "tok_visa",
            "lines": [line(&book, 1)],
        })),
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("order_batches_total"));
}
