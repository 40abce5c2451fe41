//! Requests through the full router without signing in.
//!
//! None of these reach the database: the extractors reject the request
//! first, so the lazy pool is never used.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use salonhub_integration_tests::app_without_database;

async fn send(request: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app_without_database().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, location, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (status, _, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn test_login_page_renders() {
    let (status, _, body) = send(get("/auth/login")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<form"));
    assert!(html.contains("name=\"email\""));
}

#[tokio::test]
async fn test_dashboard_redirects_to_login() {
    let (status, location, _) = send(get("/")).await;
    assert!(status.is_redirection());
    assert_eq!(location.as_deref(), Some("/auth/login"));
}

#[tokio::test]
async fn test_api_requires_session() {
    for uri in [
        "/api/auth/me",
        "/api/dashboard",
        "/api/users",
        "/api/clients",
        "/api/branches",
        "/api/services",
        "/api/products",
        "/api/suppliers",
        "/api/appointments",
        "/api/transactions",
        "/api/content/homepage",
    ] {
        let (status, _, body) = send(get(uri)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_checkout_requires_session() {
    let sale = r#"{"branch_id":1,"items":[{"kind":"service","item_id":1,"quantity":1}],"payment_method":"cash"}"#;
    let (status, _, _) = send(post_json("/api/transactions", sale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(post_json("/api/transactions/1/void", r#"{"reason":"x"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_loyalty_adjustment_requires_session() {
    let body = r#"{"branch_id":1,"points":50}"#;
    let (status, _, _) = send(post_json("/api/clients/1/loyalty/redeem", body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (status, _, _) = send(get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
