use axum::{extract::State, http::HeaderMap, response::Json};
use bytes::Bytes;

use crate::{errors::ServiceError, services::payments::WebhookReceipt, AppState};

// POST /api/v1/payment/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payment/webhook",
    summary = "Payment provider webhook",
    description = "Signed with the Stripe-Signature header. Settles the referenced order on checkout completion or expiry.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookReceipt),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReceipt>, ServiceError> {
    let receipt = state
        .services
        .payments
        .handle_webhook(&headers, &body)
        .await?;
    Ok(Json(receipt))
}
