use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{IdPath, JsonBody};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{
        commerce::checkout_service::{CheckoutRedirect, CheckoutRequest},
        orders::OrderResponse,
        payments::PaymentOutcome,
    },
    AppState,
};

/// Signed token appended to the checkout return URLs
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

/// Order after a checkout return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentCallbackResponse {
    pub order: OrderResponse,
}

#[utoipa::path(
    post,
    path = "/api/v1/payment",
    summary = "Start checkout",
    description = "Reprices the cart from the catalog, stores a PENDING order and opens a hosted checkout session.",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session opened", body = CheckoutRedirect),
        (status = 400, description = "Invalid cart or rejected by the payment provider", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account banned", body = crate::errors::ErrorResponse),
        (status = 500, description = "Payment provider unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    JsonBody(request): JsonBody<CheckoutRequest>,
) -> Result<Json<CheckoutRedirect>, ServiceError> {
    let redirect = state
        .services
        .checkout
        .initiate_checkout(&auth_user, request)
        .await?;
    Ok(Json(redirect))
}

async fn complete(
    state: &AppState,
    order_id: uuid::Uuid,
    outcome: PaymentOutcome,
    query: CallbackQuery,
) -> Result<Json<PaymentCallbackResponse>, ServiceError> {
    let result = state
        .services
        .payments
        .complete_checkout(order_id, outcome, query.token.as_deref())
        .await?;
    Ok(Json(PaymentCallbackResponse {
        order: result.order.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/payment/success/{orderId}",
    summary = "Checkout success return",
    params(("orderId" = uuid::Uuid, Path, description = "Order ID"), CallbackQuery),
    responses(
        (status = 200, description = "Order marked SUCCESSED", body = PaymentCallbackResponse),
        (status = 401, description = "Missing or invalid callback token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already settled differently", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn payment_success(
    State(state): State<AppState>,
    IdPath(order_id): IdPath,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<PaymentCallbackResponse>, ServiceError> {
    complete(&state, order_id, PaymentOutcome::Success, query).await
}

#[utoipa::path(
    get,
    path = "/api/v1/payment/cancel/{orderId}",
    summary = "Checkout cancel return",
    params(("orderId" = uuid::Uuid, Path, description = "Order ID"), CallbackQuery),
    responses(
        (status = 200, description = "Order marked FAILED", body = PaymentCallbackResponse),
        (status = 401, description = "Missing or invalid callback token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already settled differently", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn payment_cancel(
    State(state): State<AppState>,
    IdPath(order_id): IdPath,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<PaymentCallbackResponse>, ServiceError> {
    complete(&state, order_id, PaymentOutcome::Cancel, query).await
}
