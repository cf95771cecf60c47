pub mod categories;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::{AccountService, PasswordResetNotifier},
        commerce::{CatalogService, CheckoutService, CheckoutSettings},
        orders::OrderService,
        payment_provider::PaymentProvider,
        payments::{CallbackSigner, PaymentService, WebhookVerifier},
    },
};
use std::sync::Arc;
use std::time::Duration;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wire every service from the shared pool, configuration and
    /// external collaborators.
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        auth_service: Arc<AuthService>,
        event_sender: Arc<EventSender>,
        payment_provider: Arc<dyn PaymentProvider>,
        reset_notifier: Arc<dyn PasswordResetNotifier>,
    ) -> Self {
        let signer = Arc::new(CallbackSigner::new(&config.payment_callback_secret));
        let webhook_verifier = config
            .payment_webhook_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .map(|secret| {
                WebhookVerifier::new(
                    secret,
                    Duration::from_secs(config.payment_webhook_tolerance_secs),
                )
            });

        let accounts = Arc::new(AccountService::new(
            db_pool.clone(),
            auth_service,
            event_sender.clone(),
            reset_notifier,
            config.password_reset_ttl(),
        ));
        let catalog = Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(db_pool, Some(event_sender)));
        let checkout = Arc::new(CheckoutService::new(
            catalog.clone(),
            orders.clone(),
            payment_provider,
            signer.clone(),
            CheckoutSettings {
                currency: config.default_currency.to_lowercase(),
                success_url: config.checkout_success_url.clone(),
                cancel_url: config.checkout_cancel_url.clone(),
            },
        ));
        let payments = Arc::new(PaymentService::new(
            orders.clone(),
            signer,
            webhook_verifier,
        ));

        Self {
            accounts,
            catalog,
            orders,
            checkout,
            payments,
        }
    }
}
