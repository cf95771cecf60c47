mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = response_json(response).await;
    assert!(doc["paths"].get("/api/v1/payment").is_some());
    assert!(doc["paths"].get("/api/v1/users/login").is_some());
}

#[tokio::test]
async fn errors_carry_the_request_id() {
    let app = TestApp::new().await;
    let response = app
        .send(
            axum::http::Request::builder()
                .uri("/api/v1/users/me")
                .header("x-request-id", "req-users-me")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-request-id"], "req-users-me");

    let body = response_json(response).await;
    assert_eq!(body["request_id"], "req-users-me");
    assert_eq!(body["error"], "Unauthorized");
}
