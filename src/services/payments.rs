//! Payment status callbacks from the hosted checkout.
//!
//! Two routes lead here: the browser redirect after checkout (success or
//! cancel URL carrying a signed token) and the provider's signed webhook.
//! Both end in [`OrderService::transition_payment_status`].

use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::order::PaymentStatus,
    errors::ServiceError,
    services::orders::{OrderService, TransitionOutcome},
};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Which checkout return URL the customer came back through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Cancel,
}

impl PaymentOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentOutcome::Success => "success",
            PaymentOutcome::Cancel => "cancel",
        }
    }

    pub fn target_status(self) -> PaymentStatus {
        match self {
            PaymentOutcome::Success => PaymentStatus::Successed,
            PaymentOutcome::Cancel => PaymentStatus::Failed,
        }
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn hmac_for(secret: &[u8]) -> Result<HmacSha256, ServiceError> {
    HmacSha256::new_from_slice(secret)
        .map_err(|e| ServiceError::InternalError(format!("invalid HMAC key: {}", e)))
}

/// Signs and verifies the tokens embedded in checkout return URLs.
///
/// A token is the hex HMAC-SHA256 of `"{order_id}:{outcome}"`, so a success
/// token cannot be replayed against the cancel URL or another order.
pub struct CallbackSigner {
    secret: Vec<u8>,
}

impl CallbackSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, order_id: Uuid, outcome: PaymentOutcome) -> Result<HmacSha256, ServiceError> {
        let mut mac = hmac_for(&self.secret)?;
        mac.update(format!("{}:{}", order_id, outcome.as_str()).as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, order_id: Uuid, outcome: PaymentOutcome) -> Result<String, ServiceError> {
        Ok(hex::encode(
            self.mac(order_id, outcome)?.finalize().into_bytes(),
        ))
    }

    /// Constant-time comparison against the expected token.
    pub fn verify(&self, order_id: Uuid, outcome: PaymentOutcome, token: &str) -> bool {
        let Ok(provided) = hex::decode(token.trim()) else {
            return false;
        };
        match self.mac(order_id, outcome) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }
}

/// Verifies `Stripe-Signature` headers on incoming webhooks
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Checks the `t=` timestamp against `now` and any `v1=` signature
    /// against HMAC-SHA256 of `"{t}.{payload}"`.
    pub fn verify(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<(), ServiceError> {
        let header = headers
            .get(STRIPE_SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing webhook signature".to_string()))?;

        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let invalid = || ServiceError::Unauthorized("Invalid webhook signature".to_string());
        let timestamp = timestamp.ok_or_else(invalid)?;
        let issued_at: i64 = timestamp.parse().map_err(|_| invalid())?;
        if (now - issued_at).unsigned_abs() > self.tolerance.as_secs() {
            warn!(issued_at, now, "Webhook timestamp outside tolerance");
            return Err(invalid());
        }

        let mut mac = hmac_for(self.secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(invalid())
        }
    }
}

/// Minimal view of a provider webhook event
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

impl WebhookEvent {
    /// The order a checkout session event refers to, via `client_reference_id`
    /// or `metadata.order_id`.
    pub fn order_id(&self) -> Option<Uuid> {
        let object = &self.data.object;
        object
            .get("client_reference_id")
            .and_then(Value::as_str)
            .or_else(|| {
                object
                    .get("metadata")
                    .and_then(|m| m.get("order_id"))
                    .and_then(Value::as_str)
            })
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Outcome implied by the event, `None` for events that do not settle an order.
    pub fn outcome(&self) -> Option<PaymentOutcome> {
        match self.event_type.as_str() {
            "checkout.session.completed" => {
                match self.data.object.get("payment_status").and_then(Value::as_str) {
                    Some("paid") | Some("no_payment_required") => Some(PaymentOutcome::Success),
                    // Delayed methods finish with async_payment_* later.
                    _ => None,
                }
            }
            "checkout.session.async_payment_succeeded" => Some(PaymentOutcome::Success),
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                Some(PaymentOutcome::Cancel)
            }
            _ => None,
        }
    }
}

/// Acknowledgement returned to the provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookReceipt {
    pub received: bool,
    /// Whether the event changed an order
    pub applied: bool,
}

pub struct PaymentService {
    orders: Arc<OrderService>,
    signer: Arc<CallbackSigner>,
    webhook_verifier: Option<WebhookVerifier>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<OrderService>,
        signer: Arc<CallbackSigner>,
        webhook_verifier: Option<WebhookVerifier>,
    ) -> Self {
        Self {
            orders,
            signer,
            webhook_verifier,
        }
    }

    /// Applies a checkout return callback after verifying its token.
    #[instrument(skip(self, token))]
    pub async fn complete_checkout(
        &self,
        order_id: Uuid,
        outcome: PaymentOutcome,
        token: Option<&str>,
    ) -> Result<TransitionOutcome, ServiceError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("Missing callback token".to_string()))?;
        if !self.signer.verify(order_id, outcome, token) {
            warn!(%order_id, "Rejected payment callback with invalid token");
            return Err(ServiceError::Unauthorized(
                "Invalid callback token".to_string(),
            ));
        }

        let result = self
            .orders
            .transition_payment_status(order_id, outcome.target_status())
            .await?;
        info!(%order_id, changed = result.changed, status = %result.order.payment_status, "Payment callback applied");
        Ok(result)
    }

    /// Verifies and applies a provider webhook.
    ///
    /// Events that reference unknown orders or already-settled orders are
    /// acknowledged without effect so the provider stops retrying them.
    #[instrument(skip(self, headers, payload), fields(bytes = payload.len()))]
    pub async fn handle_webhook(
        &self,
        headers: &HeaderMap,
        payload: &[u8],
    ) -> Result<WebhookReceipt, ServiceError> {
        let verifier = self.webhook_verifier.as_ref().ok_or_else(|| {
            ServiceError::Unauthorized("Webhook signing secret is not configured".to_string())
        })?;
        verifier.verify(headers, payload, Utc::now().timestamp())?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        let Some(outcome) = event.outcome() else {
            info!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookReceipt {
                received: true,
                applied: false,
            });
        };
        let Some(order_id) = event.order_id() else {
            warn!(event_id = %event.id, "Webhook event carries no order reference");
            return Ok(WebhookReceipt {
                received: true,
                applied: false,
            });
        };

        match self
            .orders
            .transition_payment_status(order_id, outcome.target_status())
            .await
        {
            Ok(result) => Ok(WebhookReceipt {
                received: true,
                applied: result.changed,
            }),
            Err(ServiceError::NotFound(_)) | Err(ServiceError::Conflict(_)) => {
                warn!(event_id = %event.id, %order_id, "Webhook event does not apply to order");
                Ok(WebhookReceipt {
                    received: true,
                    applied: false,
                })
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test_5f1c0a9e7b3d4c2a8e6f1b0d9c7a5e3f";

    fn stripe_header(payload: &[u8], timestamp: i64, secret: &str) -> HeaderMap {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        let sig = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert(
            STRIPE_SIGNATURE_HEADER,
            HeaderValue::from_str(&format!("t={},v1={}", timestamp, sig)).unwrap(),
        );
        headers
    }

    #[test]
    fn callback_token_is_bound_to_order_and_outcome() {
        let signer = CallbackSigner::new("callback-secret-0123456789abcdef0123");
        let order_id = Uuid::new_v4();
        let token = signer.sign(order_id, PaymentOutcome::Success).unwrap();

        assert_eq!(token.len(), 64);
        assert!(signer.verify(order_id, PaymentOutcome::Success, &token));
        assert!(!signer.verify(order_id, PaymentOutcome::Cancel, &token));
        assert!(!signer.verify(Uuid::new_v4(), PaymentOutcome::Success, &token));
        assert!(!signer.verify(order_id, PaymentOutcome::Success, "not-hex"));
    }

    #[test]
    fn webhook_signature_accepts_fresh_valid_signature() {
        let verifier = WebhookVerifier::new(SECRET, Duration::from_secs(300));
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;

        let headers = stripe_header(payload, now - 10, SECRET);
        assert!(verifier.verify(&headers, payload, now).is_ok());

        let tampered = br#"{"id":"evt_2"}"#;
        assert_matches!(
            verifier.verify(&headers, tampered, now),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn webhook_signature_rejects_stale_or_foreign_signatures() {
        let verifier = WebhookVerifier::new(SECRET, Duration::from_secs(300));
        let payload = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;

        let stale = stripe_header(payload, now - 301, SECRET);
        assert!(verifier.verify(&stale, payload, now).is_err());

        let foreign = stripe_header(payload, now, "whsec_someone_else_entirely_000000");
        assert!(verifier.verify(&foreign, payload, now).is_err());

        assert!(verifier.verify(&HeaderMap::new(), payload, now).is_err());
    }

    #[test]
    fn checkout_events_map_to_outcomes() {
        let order_id = Uuid::new_v4();
        let event = |event_type: &str, payment_status: &str| WebhookEvent {
            id: "evt_1".into(),
            event_type: event_type.into(),
            data: WebhookEventData {
                object: serde_json::json!({
                    "client_reference_id": order_id.to_string(),
                    "payment_status": payment_status,
                }),
            },
        };

        let completed = event("checkout.session.completed", "paid");
        assert_eq!(completed.outcome(), Some(PaymentOutcome::Success));
        assert_eq!(completed.order_id(), Some(order_id));
        assert_eq!(event("checkout.session.completed", "unpaid").outcome(), None);
        assert_eq!(
            event("checkout.session.expired", "unpaid").outcome(),
            Some(PaymentOutcome::Cancel)
        );
        assert_eq!(event("charge.refunded", "paid").outcome(), None);
    }
}
