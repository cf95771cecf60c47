use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

/// One priced line of a hosted checkout page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub image: Option<String>,
    /// Price per unit in minor currency units
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
}

impl CheckoutSessionRequest {
    pub fn total_minor_units(&self) -> i64 {
        self.line_items
            .iter()
            .map(|item| item.unit_amount * i64::from(item.quantity))
            .sum()
    }
}

/// Hosted checkout session created by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum PaymentProviderError {
    /// The provider refused the request because of what we sent.
    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

impl From<PaymentProviderError> for ServiceError {
    fn from(err: PaymentProviderError) -> Self {
        match err {
            PaymentProviderError::Rejected { message, .. } => {
                ServiceError::BadRequest(format!("Checkout could not be created: {}", message))
            }
            other => ServiceError::PaymentProviderError(other.to_string()),
        }
    }
}

/// Creates hosted checkout sessions with an external payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentProviderError>;
}

/// Stripe Checkout over its form-encoded REST API
pub struct StripeCheckoutClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl StripeCheckoutClient {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn form_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
        let order_id = request.order_id.to_string();
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), order_id.clone()),
            ("metadata[order_id]".to_string(), order_id),
        ];

        if let Some(email) = &request.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }

        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            params.push((
                format!("{prefix}[price_data][currency]"),
                request.currency.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(image) = &item.image {
                params.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        params
    }
}

#[async_trait]
impl PaymentProvider for StripeCheckoutClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentProviderError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let params = Self::form_params(request);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, Some(""))
            .header("Idempotency-Key", format!("checkout-{}", request.order_id))
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(status = status.as_u16(), %message, "Stripe rejected checkout session");

            // 401/403/429 mean our credentials or quota are wrong, not the cart.
            return Err(match status.as_u16() {
                400 | 402 | 404 => PaymentProviderError::Rejected {
                    status: status.as_u16(),
                    message,
                },
                _ => PaymentProviderError::Unavailable(message),
            });
        }

        let session: StripeSessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentProviderError::InvalidResponse(e.to_string()))?;
        let url = session.url.ok_or_else(|| {
            PaymentProviderError::InvalidResponse("checkout session has no url".to_string())
        })?;

        debug!(session_id = %session.id, "Stripe checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            order_id: Uuid::nil(),
            currency: "eur".into(),
            line_items: vec![
                CheckoutLineItem {
                    name: "Serum".into(),
                    image: Some("https://cdn.example.com/serum.png".into()),
                    unit_amount: 1099,
                    quantity: 2,
                },
                CheckoutLineItem {
                    name: "Toner".into(),
                    image: None,
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            success_url: "https://shop.example.com/ok".into(),
            cancel_url: "https://shop.example.com/cancel".into(),
            customer_email: Some("ada@example.com".into()),
        }
    }

    #[test]
    fn total_is_sum_of_unit_amount_times_quantity() {
        assert_eq!(request().total_minor_units(), 2698);
    }

    #[test]
    fn form_params_encode_line_items_and_reference() {
        let params = StripeCheckoutClient::form_params(&request());
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("client_reference_id"), Some(Uuid::nil().to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1099"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(
            get("line_items[0][price_data][product_data][images][0]"),
            Some("https://cdn.example.com/serum.png")
        );
        assert_eq!(get("line_items[1][price_data][product_data][images][0]"), None);
        assert_eq!(get("line_items[1][price_data][currency]"), Some("eur"));
        assert_eq!(get("customer_email"), Some("ada@example.com"));
    }

    #[test]
    fn rejection_maps_to_bad_request() {
        let err: ServiceError = PaymentProviderError::Rejected {
            status: 400,
            message: "Invalid currency".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let err: ServiceError = PaymentProviderError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ServiceError::PaymentProviderError(_)));
    }
}
