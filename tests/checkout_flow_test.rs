//! Integration tests for the checkout flow.
//!
//! Tests cover:
//! - Cart → PENDING order → hosted checkout session
//! - Minor-unit pricing sent to the provider
//! - Provider failures and their compensation
//! - Validation and authorization failures

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, ProviderMode, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::json;
use storefront_api::entities::{
    commerce::product::{ActiveModel as ProductActiveModel, Entity as ProductEntity},
    order::Entity as OrderEntity,
};
use uuid::Uuid;

async fn order_count(app: &TestApp) -> u64 {
    OrderEntity::find()
        .count(&*app.state.db)
        .await
        .expect("count orders")
}

fn decimal_field(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("decimal")
}

#[tokio::test]
async fn reference_cart_is_charged_in_minor_units() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let cleanser = app.create_product(&admin, "Cleanser", "5.00").await;
    let customer = app.register_user("ada@example.com").await;

    let response = app
        .checkout(
            &customer,
            json!([
                { "_id": serum, "title": "Serum", "price": 10.99, "quantity": 2 },
                { "_id": cleanser, "title": "Cleanser", "price": 5.00, "quantity": 1 }
            ]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let order_id = Uuid::parse_str(body["orderId"].as_str().unwrap()).unwrap();
    assert_eq!(
        body["url"].as_str().unwrap(),
        "https://checkout.example.com/c/pay/cs_test_1"
    );

    let requests = app.provider.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.order_id, order_id);
    assert_eq!(request.total_minor_units(), 2698);
    let amounts: Vec<(i64, u32)> = request
        .line_items
        .iter()
        .map(|line| (line.unit_amount, line.quantity))
        .collect();
    assert_eq!(amounts, vec![(1099, 2), (500, 1)]);
    assert_eq!(request.customer_email.as_deref(), Some("ada@example.com"));
    assert!(request
        .success_url
        .starts_with(&format!("https://shop.example.com/payment/success/{}?token=", order_id)));
    assert!(request
        .cancel_url
        .starts_with(&format!("https://shop.example.com/payment/cancel/{}?token=", order_id)));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&customer.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = response_json(response).await;
    assert_eq!(decimal_field(&order["totalPrice"]), dec!(26.98));
    assert_eq!(order["paymentStatus"], "PENDING");
    assert_eq!(order["checkoutSessionId"], "cs_test_1");
    assert_eq!(order["user"], customer.id.to_string());
    assert_eq!(order["products"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stored_total_matches_amount_charged() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let toner = app.create_product(&admin, "Toner", "1.00").await;
    let customer = app.register_user("ada@example.com").await;

    // Rows written before prices were capped at cents can still carry sub-cent precision.
    let mut product: ProductActiveModel = ProductEntity::find_by_id(toner)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    product.price = Set(dec!(1.005));
    product.update(&*app.state.db).await.unwrap();

    let response = app
        .checkout(&customer, json!([{ "_id": toner, "quantity": 2 }]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let order_id = body["orderId"].as_str().unwrap();

    let order = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&customer.token),
        )
        .await,
    )
    .await;
    let charged = app.provider.requests()[0].total_minor_units();
    assert_eq!(
        decimal_field(&order["totalPrice"]) * Decimal::ONE_HUNDRED,
        Decimal::from(charged)
    );
}

#[tokio::test]
async fn catalog_price_wins_over_cart_price() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;

    let response = app
        .checkout(
            &customer,
            json!([{ "_id": serum, "price": 0.01, "quantity": 1 }]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.provider.requests()[0].line_items[0].unit_amount, 1099);
}

#[tokio::test]
async fn checkout_without_authorization_creates_no_order() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payment",
            Some(json!({ "order": [{ "_id": serum, "quantity": 1 }] })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(order_count(&app).await, 0);
    assert!(app.provider.requests().is_empty());
}

#[tokio::test]
async fn valid_checkout_appends_one_pending_order_to_the_user() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;

    let response = app
        .checkout(&customer, json!([{ "_id": serum, "quantity": 3 }]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order_id = response_json(response).await["orderId"]
        .as_str()
        .unwrap()
        .to_string();

    let me = response_json(
        app.request(Method::GET, "/api/v1/users/me", None, Some(&customer.token))
            .await,
    )
    .await;
    assert_eq!(me["orders"], json!([order_id]));
    assert_eq!(order_count(&app).await, 1);

    let orders = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/user/{}", customer.id),
            None,
            Some(&customer.token),
        )
        .await,
    )
    .await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["paymentStatus"], "PENDING");
}

#[tokio::test]
async fn provider_outage_marks_order_failed() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;
    app.provider.set_mode(ProviderMode::Unavailable);

    let response = app
        .checkout(&customer, json!([{ "_id": serum, "quantity": 1 }]))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Payment provider unavailable");

    let orders = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/user/{}", customer.id),
            None,
            Some(&customer.token),
        )
        .await,
    )
    .await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["paymentStatus"], "FAILED");
}

#[tokio::test]
async fn provider_rejection_is_a_bad_request() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;
    app.provider.set_mode(ProviderMode::Reject);

    let response = app
        .checkout(&customer, json!([{ "_id": serum, "quantity": 1 }]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let orders = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/user/{}", customer.id),
            None,
            Some(&customer.token),
        )
        .await,
    )
    .await;
    assert_eq!(orders[0]["paymentStatus"], "FAILED");
}

#[tokio::test]
async fn unknown_product_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let customer = app.register_user("ada@example.com").await;

    let response = app
        .checkout(
            &customer,
            json!([{ "_id": Uuid::new_v4(), "quantity": 1 }]),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(order_count(&app).await, 0);
    assert!(app.provider.requests().is_empty());
}

#[tokio::test]
async fn empty_cart_and_bad_quantities_are_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;

    let empty = app.checkout(&customer, json!([])).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    for quantity in [0, -2] {
        let response = app
            .checkout(&customer, json!([{ "_id": serum, "quantity": quantity }]))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "quantity {}", quantity);
    }
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn banned_customer_cannot_check_out() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let serum = app.create_product(&admin, "Serum", "10.99").await;
    let customer = app.register_user("ada@example.com").await;

    let ban = app
        .request(
            Method::PUT,
            &format!("/api/v1/users/{}/ban", customer.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(ban.status(), StatusCode::OK);

    let response = app
        .checkout(&customer, json!([{ "_id": serum, "quantity": 1 }]))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(order_count(&app).await, 0);
}
