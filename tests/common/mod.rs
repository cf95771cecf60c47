#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use storefront_api::{
    auth::{user::Model as UserModel, AuthConfig, AuthService, UserRole},
    config::AppConfig,
    db,
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        accounts::{LoginInput, PasswordResetNotifier, RegisterUserInput},
        payment_provider::{
            CheckoutSession, CheckoutSessionRequest, PaymentProvider, PaymentProviderError,
        },
        payments::{CallbackSigner, PaymentOutcome},
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

pub const JWT_SECRET: &str =
    "Zq8vN3xR7tLp2mWc9yHb4kJd6fGs1aEu5oTi0nVr3xQw8zLm2pYc7hBk4jDf9gSa";
pub const CALLBACK_SECRET: &str = "callback-secret-9f8e7d6c5b4a3f2e1d0c9b8a";
pub const WEBHOOK_SECRET: &str = "whsec_test_5f1c0a9e7b3d4c2a8e6f1b0d9c7a5e3f";
pub const DEFAULT_PASSWORD: &str = "correct-horse-battery";

/// How the fake checkout provider answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Succeed,
    Reject,
    Unavailable,
}

/// Checkout provider double that records every session request
pub struct FakePaymentProvider {
    mode: Mutex<ProviderMode>,
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl FakePaymentProvider {
    fn new() -> Self {
        Self {
            mode: Mutex::new(ProviderMode::Succeed),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: ProviderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentProviderError> {
        let mode = *self.mode.lock().unwrap();
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        match mode {
            ProviderMode::Succeed => {
                let id = format!("cs_test_{}", requests.len());
                Ok(CheckoutSession {
                    url: format!("https://checkout.example.com/c/pay/{}", id),
                    id,
                })
            }
            ProviderMode::Reject => Err(PaymentProviderError::Rejected {
                status: 400,
                message: "Invalid email address".to_string(),
            }),
            ProviderMode::Unavailable => Err(PaymentProviderError::Unavailable(
                "connection refused".to_string(),
            )),
        }
    }
}

/// Notifier double keeping every issued reset token
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingNotifier {
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl PasswordResetNotifier for CapturingNotifier {
    async fn send_reset_token(
        &self,
        user: &UserModel,
        token: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((user.email.clone(), token.to_string()));
        Ok(())
    }
}

/// Registered account plus a bearer token for it
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Helper harness for spinning up the full router against a temporary SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub provider: Arc<FakePaymentProvider>,
    pub notifier: Arc<CapturingNotifier>,
    signer: CallbackSigner,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            JWT_SECRET.to_string(),
            CALLBACK_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        cfg.checkout_success_url = "https://shop.example.com/payment/success".to_string();
        cfg.checkout_cancel_url = "https://shop.example.com/payment/cancel".to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            cfg.jwt_ttl(),
        )));

        let provider = Arc::new(FakePaymentProvider::new());
        let notifier = Arc::new(CapturingNotifier::default());
        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            auth_service.clone(),
            event_sender,
            provider.clone(),
            notifier.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            auth: auth_service,
            services,
        };
        let router = storefront_api::build_router(state.clone(), CorsLayer::permissive());

        Self {
            router,
            state,
            provider,
            notifier,
            signer: CallbackSigner::new(CALLBACK_SECRET),
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a raw request, for payloads that must not be re-serialized.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Register a customer through the API and log them in.
    pub async fn register_user(&self, email: &str) -> TestUser {
        let response = self
            .request(
                Method::POST,
                "/api/v1/users",
                Some(json!({
                    "firstname": "Ada",
                    "lastname": "Lovelace",
                    "email": email,
                    "password": DEFAULT_PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "register {}", email);
        let body = response_json(response).await;
        let id = Uuid::parse_str(body["_id"].as_str().expect("user id")).expect("uuid");

        let token = self.login(email, DEFAULT_PASSWORD).await;
        TestUser {
            id,
            email: email.to_string(),
            token,
        }
    }

    /// Log in through the API and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/users/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login {}", email);
        let body = response_json(response).await;
        body["token"].as_str().expect("token").to_string()
    }

    /// Create an administrator directly through the account service.
    pub async fn admin(&self) -> TestUser {
        let email = format!("admin-{}@example.com", Uuid::new_v4().simple());
        let accounts = self.state.services.accounts.clone();
        let user = accounts
            .register(
                RegisterUserInput {
                    firstname: "Store".to_string(),
                    lastname: "Admin".to_string(),
                    email: email.clone(),
                    password: DEFAULT_PASSWORD.to_string(),
                    avatar: None,
                },
                UserRole::Admin,
            )
            .await
            .expect("create admin");
        let login = accounts
            .login(LoginInput {
                email: email.clone(),
                password: DEFAULT_PASSWORD.to_string(),
            })
            .await
            .expect("admin login");
        TestUser {
            id: user.id,
            email,
            token: login.token,
        }
    }

    /// Create a product through the admin API and return its id.
    pub async fn create_product(&self, admin: &TestUser, title: &str, price: &str) -> Uuid {
        let response = self
            .request(
                Method::POST,
                "/api/v1/products",
                Some(json!({
                    "title": title,
                    "price": price,
                    "images": [format!("https://cdn.example.com/{}.png", title.to_lowercase())],
                })),
                Some(&admin.token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "create product {}", title);
        let body = response_json(response).await;
        Uuid::parse_str(body["_id"].as_str().expect("product id")).expect("uuid")
    }

    /// Run a checkout for the given cart and return the response.
    pub async fn checkout(&self, user: &TestUser, cart: Value) -> Response {
        self.request(
            Method::POST,
            "/api/v1/payment",
            Some(json!({ "order": cart })),
            Some(&user.token),
        )
        .await
    }

    /// Signed token for a checkout return URL
    pub fn callback_token(&self, order_id: Uuid, outcome: PaymentOutcome) -> String {
        self.signer
            .sign(order_id, outcome)
            .expect("sign callback token")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
