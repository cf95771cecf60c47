//! Storefront API Library
//!
//! Accounts, catalog, orders and hosted checkout for a small online shop.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::FromRef,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};
use utoipa::OpenApi;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

impl FromRef<AppState> for Arc<auth::AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    let users = Router::new()
        .route(
            "/users",
            post(handlers::users::register).get(handlers::users::list_users),
        )
        .route("/users/login", post(handlers::users::login))
        .route("/users/me", get(handlers::users::me))
        .route(
            "/users/password-reset",
            post(handlers::users::request_password_reset),
        )
        .route(
            "/users/password-reset/confirm",
            post(handlers::users::confirm_password_reset),
        )
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/{id}/ban", put(handlers::users::ban_user))
        .route("/users/{id}/unban", put(handlers::users::unban_user));

    let catalog = Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/{id}",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/categories",
            get(handlers::categories::list_categories)
                .post(handlers::categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(handlers::categories::get_category)
                .put(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        );

    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route(
            "/orders/user/{userId}",
            get(handlers::orders::list_user_orders),
        )
        .route(
            "/orders/{id}",
            get(handlers::orders::get_order).delete(handlers::orders::delete_order),
        );

    let payments = Router::new()
        .route("/payment", post(handlers::payments::create_checkout))
        .route(
            "/payment/success/{orderId}",
            get(handlers::payments::payment_success),
        )
        .route(
            "/payment/cancel/{orderId}",
            get(handlers::payments::payment_cancel),
        )
        .route(
            "/payment/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        );

    Router::new()
        .merge(users)
        .merge(catalog)
        .merge(orders)
        .merge(payments)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDocV1::openapi())
}

/// Requests running past `timeout` are answered with 408.
fn request_timeout_layer(timeout: std::time::Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Full application router with the HTTP middleware stack applied.
pub fn build_router(state: AppState, cors_layer: CorsLayer) -> Router {
    let request_timeout = state.config.request_timeout();
    let max_body_size = state.config.max_body_size;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(request_timeout_layer(request_timeout))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors_layer)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::errors::*;
    pub use crate::events::{Event, EventSender};
    pub use crate::handlers::AppServices;
    pub use crate::services::*;
    pub use crate::{api_v1_routes, build_router, AppState};
}
