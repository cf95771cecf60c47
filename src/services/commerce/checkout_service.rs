use crate::{
    auth::AuthUser,
    entities::order::{LineItem, LineItems, Model as OrderModel, PaymentStatus},
    errors::ServiceError,
    services::{
        commerce::catalog::CatalogService,
        orders::{round_to_cents, to_minor_units, OrderService},
        payment_provider::{
            CheckoutLineItem, CheckoutSession, CheckoutSessionRequest, PaymentProvider,
        },
        payments::{CallbackSigner, PaymentOutcome},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One cart line as sent by the storefront.
///
/// Only the product id and quantity are trusted; the price is used for a
/// mismatch warning and everything else is ignored.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub product_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid receipt email"))]
    pub receipt_email: Option<String>,
    #[validate(length(min = 1, message = "Cart is empty"))]
    pub order: Vec<CartItem>,
}

/// Where to send the customer next
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub url: String,
    pub order_id: Uuid,
}

/// Return URLs and currency for hosted checkout sessions
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout service turning a cart into a pending order and a hosted
/// checkout session
#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<CatalogService>,
    order_service: Arc<OrderService>,
    provider: Arc<dyn PaymentProvider>,
    signer: Arc<CallbackSigner>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<CatalogService>,
        order_service: Arc<OrderService>,
        provider: Arc<dyn PaymentProvider>,
        signer: Arc<CallbackSigner>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            catalog,
            order_service,
            provider,
            signer,
            settings,
        }
    }

    /// Validate the cart and snapshot catalog prices into line items
    async fn price_cart(&self, cart: &[CartItem]) -> Result<LineItems, ServiceError> {
        let mut quantities: Vec<(Uuid, u32, Option<Decimal>)> = Vec::with_capacity(cart.len());
        for item in cart {
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| {
                    ServiceError::BadRequest(format!(
                        "Quantity for product {} must be a positive integer",
                        item.product_id
                    ))
                })?;
            quantities.push((item.product_id, quantity, item.price));
        }

        let ids: Vec<Uuid> = quantities.iter().map(|(id, _, _)| *id).collect();
        let products: HashMap<Uuid, _> = self
            .catalog
            .find_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(quantities.len());
        for (product_id, quantity, client_price) in quantities {
            let product = products.get(&product_id).ok_or_else(|| {
                ServiceError::BadRequest(format!("Unknown product {}", product_id))
            })?;
            if let Some(client_price) = client_price {
                if client_price != product.price {
                    warn!(%product_id, %client_price, catalog_price = %product.price, "Cart price differs from catalog");
                }
            }
            lines.push(LineItem {
                product_id,
                title: product.title.clone(),
                unit_price: round_to_cents(product.price),
                quantity,
                image: product.images.first().map(str::to_string),
            });
        }

        Ok(LineItems(lines))
    }

    fn return_url(
        &self,
        base: &str,
        order_id: Uuid,
        outcome: PaymentOutcome,
    ) -> Result<String, ServiceError> {
        let token = self.signer.sign(order_id, outcome)?;
        Ok(format!(
            "{}/{}?token={}",
            base.trim_end_matches('/'),
            order_id,
            token
        ))
    }

    fn session_request(
        &self,
        order_id: Uuid,
        line_items: &LineItems,
        customer_email: Option<String>,
    ) -> Result<CheckoutSessionRequest, ServiceError> {
        let line_items = line_items
            .0
            .iter()
            .map(|line| {
                Ok(CheckoutLineItem {
                    name: line.title.clone(),
                    image: line.image.clone(),
                    unit_amount: to_minor_units(line.unit_price)?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(CheckoutSessionRequest {
            order_id,
            currency: self.settings.currency.clone(),
            line_items,
            success_url: self.return_url(
                &self.settings.success_url,
                order_id,
                PaymentOutcome::Success,
            )?,
            cancel_url: self.return_url(
                &self.settings.cancel_url,
                order_id,
                PaymentOutcome::Cancel,
            )?,
            customer_email,
        })
    }

    async fn open_session(
        &self,
        order: &OrderModel,
        customer_email: Option<String>,
    ) -> Result<CheckoutSession, ServiceError> {
        let request = self.session_request(order.id, &order.line_items, customer_email)?;
        Ok(self.provider.create_checkout_session(&request).await?)
    }

    /// Create a PENDING order for the caller's cart and open a hosted
    /// checkout session for it.
    ///
    /// If the provider call fails the order is marked FAILED before the
    /// error is returned.
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn initiate_checkout(
        &self,
        user: &AuthUser,
        request: CheckoutRequest,
    ) -> Result<CheckoutRedirect, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::BadRequest(format!("Invalid checkout request: {}", e)))?;

        let line_items = self.price_cart(&request.order).await?;
        let customer_email = request
            .receipt_email
            .or_else(|| Some(user.email.clone()))
            .filter(|email| !email.is_empty());

        let order = self
            .order_service
            .create_pending_order(user.user_id, line_items, &self.settings.currency)
            .await?;

        let session = match self.open_session(&order, customer_email).await {
            Ok(session) => session,
            Err(err) => {
                error!(order_id = %order.id, error = %err, "Checkout session creation failed");
                if let Err(compensation) = self
                    .order_service
                    .transition_payment_status(order.id, PaymentStatus::Failed)
                    .await
                {
                    error!(order_id = %order.id, error = %compensation, "Failed to mark order as FAILED");
                }
                return Err(err);
            }
        };

        if let Err(e) = self
            .order_service
            .record_checkout_session(order.id, &session.id)
            .await
        {
            // The webhook finds the order through client_reference_id, so
            // the customer can still pay.
            error!(order_id = %order.id, session_id = %session.id, error = %e, "Failed to record checkout session");
        }

        info!(order_id = %order.id, session_id = %session.id, "Checkout session created");
        Ok(CheckoutRedirect {
            url: session.url,
            order_id: order.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_parses_storefront_shape() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "receipt_email": "ada@example.com",
            "order": [{
                "_id": "6f1c2a9e-7b3d-4c2a-8e6f-1b0d9c7a5e3f",
                "title": "Serum",
                "price": 10.99,
                "images": ["https://cdn.example.com/serum.png"],
                "quantity": 2
            }]
        }))
        .unwrap();

        assert_eq!(request.order.len(), 1);
        assert_eq!(request.order[0].quantity, 2);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_cart_and_bad_email_fail_validation() {
        let empty = CheckoutRequest {
            receipt_email: None,
            order: vec![],
        };
        assert!(empty.validate().is_err());

        let bad_email = CheckoutRequest {
            receipt_email: Some("nope".into()),
            order: vec![CartItem {
                product_id: Uuid::new_v4(),
                quantity: 1,
                price: None,
                title: None,
            }],
        };
        assert!(bad_email.validate().is_err());
    }
}
