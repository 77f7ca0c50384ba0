//! Handler tests for Products domain
//!
//! These tests verify that HTTP handlers work correctly:
//! - Request deserialization (JSON → Rust structs)
//! - Response serialization (Rust structs → JSON)
//! - HTTP status codes
//! - Error responses
//!
//! The router is backed by the in-memory document store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use domain_products::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // For oneshot()

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn app() -> Router {
    let repo = StoreProductRepository::new(InMemoryDocumentStore::new());
    handlers::router(ProductService::new(repo))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, name: &str, price: f64) -> Product {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/", json!({ "name": name, "price": price })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response.into_body()).await
}

#[tokio::test]
async fn test_create_product_returns_201_with_store_keys() {
    let app = app();

    let response = app
        .oneshot(json_request("POST", "/", json!({ "name": "Widget", "price": 9.99 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["name"], "Widget");
    assert!(body["_id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(body["_rev"].as_str().is_some_and(|rev| rev.starts_with("1-")));
}

#[tokio::test]
async fn test_create_product_validates_input() {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/", json!({ "name": "ab", "price": 1.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: Value = json_body(response.into_body()).await;
    assert_eq!(error["error"], "VALIDATION_ERROR");

    let response = app
        .oneshot(json_request("POST", "/", json!({ "name": "Widget", "price": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_duplicate_name_returns_409() {
    let app = app();
    create(&app, "Widget", 1.0).await;

    let response = app
        .oneshot(json_request("POST", "/", json!({ "name": "Widget", "price": 2.0 })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: Value = json_body(response.into_body()).await;
    assert_eq!(error["error"], "CONFLICT");
}

#[tokio::test]
async fn test_get_product() {
    let app = app();
    let created = create(&app, "Widget", 1.0).await;

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/{}", created.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Product = json_body(response.into_body()).await;
    assert_eq!(fetched, created);

    let response = app.oneshot(empty_request("GET", "/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_products() {
    let app = app();
    create(&app, "Alpha", 1.0).await;
    create(&app, "Beta", 2.0).await;

    let response = app.oneshot(empty_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let products: Vec<Product> = json_body(response.into_body()).await;
    assert_eq!(products.len(), 2);
}

#[tokio::test]
async fn test_update_product_and_stale_revision() {
    let app = app();
    let created = create(&app, "Widget", 9.99).await;
    let uri = format!("/{}", created.id);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            json!({ "_rev": created.rev, "name": "Widget2", "price": 12.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Product = json_body(response.into_body()).await;
    assert_eq!(updated.name, "Widget2");
    assert_ne!(updated.rev, created.rev);

    // replaying the old revision loses
    let response = app
        .oneshot(json_request(
            "PUT",
            &uri,
            json!({ "_rev": created.rev, "name": "Widget3", "price": 1.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let error: Value = json_body(response.into_body()).await;
    assert_eq!(error["error"], "REVISION_CONFLICT");
}

#[tokio::test]
async fn test_update_requires_revision() {
    let app = app();
    let created = create(&app, "Widget", 1.0).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", created.id),
            json!({ "name": "Widget", "price": 2.0 }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_delete_product_without_revision() {
    let app = app();
    let created = create(&app, "Widget", 1.0).await;
    let uri = format!("/{}", created.id);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(empty_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_product_with_stale_revision() {
    let app = app();
    let created = create(&app, "Widget", 1.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/{}", created.id),
            json!({ "_rev": created.rev, "name": "Widget", "price": 2.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request(
            "DELETE",
            &format!("/{}?rev={}", created.id, created.rev),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_missing_product() {
    let app = app();

    let response = app
        .oneshot(empty_request("DELETE", "/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_create_returns_per_item_outcomes() {
    let app = app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/bulk-create",
            json!([
                { "name": "Alpha", "price": 1.0 },
                { "_id": "beta", "name": "Beta", "price": 2.0 }
            ]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let result: BulkResponse = json_body(response.into_body()).await;
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.items[1].id.as_deref(), Some("beta"));
}

#[tokio::test]
async fn test_bulk_create_with_taken_name_returns_409() {
    let app = app();
    create(&app, "Beta", 1.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/bulk-create",
            json!([
                { "name": "Alpha", "price": 1.0 },
                { "name": "Beta", "price": 2.0 }
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.oneshot(empty_request("GET", "/")).await.unwrap();
    let products: Vec<Product> = json_body(response.into_body()).await;
    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn test_bulk_create_rejects_invalid_item() {
    let app = app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/bulk-create",
            json!([{ "name": "Alpha", "price": -1.0 }]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_update_partial() {
    let app = app();
    let alpha = create(&app, "Alpha", 1.0).await;
    let beta = create(&app, "Beta", 1.0).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/bulk-update",
            json!([
                { "_id": alpha.id, "_rev": alpha.rev, "name": "Alpha", "price": 5.0 },
                { "_id": beta.id, "name": "Beta", "price": 5.0 }
            ]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result: BulkResponse = json_body(response.into_body()).await;
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.items[0].status, BulkItemStatus::Updated);
    assert_eq!(result.items[1].status, BulkItemStatus::Skipped);
}

#[tokio::test]
async fn test_bulk_update_everything_skipped_returns_400() {
    let app = app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/bulk-update",
            json!([{ "name": "Alpha", "price": 5.0 }]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = json_body(response.into_body()).await;
    assert_eq!(error["error"], "BAD_REQUEST");
}
