//! Checkout return callbacks: signed success/cancel URLs settle an order once.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, TestUser};
use serde_json::json;
use storefront_api::services::payments::PaymentOutcome;
use uuid::Uuid;

async fn pending_order(app: &TestApp) -> (TestUser, Uuid) {
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;
    let response = app
        .checkout(&customer, json!([{ "_id": serum, "quantity": 1 }]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let order_id = Uuid::parse_str(body["orderId"].as_str().unwrap()).unwrap();
    (customer, order_id)
}

async fn payment_status(app: &TestApp, user: &TestUser, order_id: Uuid) -> String {
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&user.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["paymentStatus"]
        .as_str()
        .unwrap()
        .to_string()
}

fn callback_uri(kind: &str, order_id: Uuid, token: &str) -> String {
    format!("/api/v1/payment/{}/{}?token={}", kind, order_id, token)
}

#[tokio::test]
async fn success_callback_marks_order_paid() {
    let app = TestApp::new().await;
    let (customer, order_id) = pending_order(&app).await;
    let token = app.callback_token(order_id, PaymentOutcome::Success);

    let response = app
        .request(Method::GET, &callback_uri("success", order_id, &token), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["order"]["_id"], order_id.to_string());
    assert_eq!(body["order"]["paymentStatus"], "SUCCESSED");

    assert_eq!(payment_status(&app, &customer, order_id).await, "SUCCESSED");
}

#[tokio::test]
async fn cancel_callback_marks_order_failed() {
    let app = TestApp::new().await;
    let (customer, order_id) = pending_order(&app).await;
    let token = app.callback_token(order_id, PaymentOutcome::Cancel);

    let response = app
        .request(Method::GET, &callback_uri("cancel", order_id, &token), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(payment_status(&app, &customer, order_id).await, "FAILED");
}

#[tokio::test]
async fn repeated_success_callback_is_idempotent() {
    let app = TestApp::new().await;
    let (customer, order_id) = pending_order(&app).await;
    let token = app.callback_token(order_id, PaymentOutcome::Success);
    let uri = callback_uri("success", order_id, &token);

    for _ in 0..2 {
        let response = app.request(Method::GET, &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(payment_status(&app, &customer, order_id).await, "SUCCESSED");
}

#[tokio::test]
async fn settled_order_cannot_flip() {
    let app = TestApp::new().await;
    let (customer, order_id) = pending_order(&app).await;

    let success = app.callback_token(order_id, PaymentOutcome::Success);
    let response = app
        .request(Method::GET, &callback_uri("success", order_id, &success), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cancel = app.callback_token(order_id, PaymentOutcome::Cancel);
    let response = app
        .request(Method::GET, &callback_uri("cancel", order_id, &cancel), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(payment_status(&app, &customer, order_id).await, "SUCCESSED");
}

#[tokio::test]
async fn callback_without_valid_token_is_rejected() {
    let app = TestApp::new().await;
    let (customer, order_id) = pending_order(&app).await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/payment/success/{}", order_id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A success token does not authorize the cancel return.
    let success = app.callback_token(order_id, PaymentOutcome::Success);
    let response = app
        .request(Method::GET, &callback_uri("cancel", order_id, &success), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::GET,
            &callback_uri("success", order_id, "deadbeef"),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(payment_status(&app, &customer, order_id).await, "PENDING");
}

#[tokio::test]
async fn callback_for_unknown_order_is_not_found() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();
    let token = app.callback_token(missing, PaymentOutcome::Success);

    let response = app
        .request(Method::GET, &callback_uri("success", missing, &token), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::GET,
            "/api/v1/payment/success/not-an-id?token=x",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
