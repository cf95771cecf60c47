use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

/// Registers the `Bearer` JWT scheme referenced by protected paths
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Backend for a small online shop: customer accounts, a product catalog grouped
into categories, orders and hosted checkout.

## Authentication

Protected endpoints expect a JWT obtained from `POST /api/v1/users/login`:

```
Authorization: Bearer <token>
```

Tokens expire after one hour. Administrative endpoints additionally require the
`admin` role.

## Checkout

`POST /api/v1/payment` reprices the cart from the catalog, stores a `PENDING`
order and returns the hosted checkout URL. The checkout provider sends the
customer back to the signed success or cancel URL, and may also deliver a
signed webhook. Either path settles the order exactly once.

## Errors

Every error body carries a human readable `message`:

```json
{
  "error": "Not Found",
  "message": "wrong id format",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Users", description = "Accounts, login and password reset"),
        (name = "Products", description = "Product catalog"),
        (name = "Categories", description = "Product categories"),
        (name = "Orders", description = "Order lookup and administration"),
        (name = "Payments", description = "Hosted checkout and payment callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Users
        crate::handlers::users::register,
        crate::handlers::users::login,
        crate::handlers::users::list_users,
        crate::handlers::users::me,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::ban_user,
        crate::handlers::users::unban_user,
        crate::handlers::users::request_password_reset,
        crate::handlers::users::confirm_password_reset,

        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::list_user_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::delete_order,

        // Payments
        crate::handlers::payments::create_checkout,
        crate::handlers::payments::payment_success,
        crate::handlers::payments::payment_cancel,
        crate::handlers::payment_webhooks::payment_webhook,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            // Users
            crate::services::accounts::RegisterUserInput,
            crate::services::accounts::LoginInput,
            crate::services::accounts::UpdateUserInput,
            crate::services::accounts::PasswordResetRequestInput,
            crate::services::accounts::PasswordResetConfirmInput,
            crate::services::accounts::UserResponse,
            crate::services::accounts::LoginResponse,
            crate::handlers::users::BanResponse,
            crate::auth::UserRole,

            // Catalog
            crate::services::commerce::catalog::CreateProductInput,
            crate::services::commerce::catalog::UpdateProductInput,
            crate::services::commerce::catalog::ProductResponse,
            crate::services::commerce::catalog::CreateCategoryInput,
            crate::services::commerce::catalog::UpdateCategoryInput,
            crate::services::commerce::catalog::CategoryResponse,

            // Orders and payments
            crate::services::orders::OrderResponse,
            crate::entities::order::LineItem,
            crate::entities::order::PaymentStatus,
            crate::services::commerce::checkout_service::CartItem,
            crate::services::commerce::checkout_service::CheckoutRequest,
            crate::services::commerce::checkout_service::CheckoutRedirect,
            crate::handlers::payments::PaymentCallbackResponse,
            crate::services::payments::WebhookReceipt,

            // Shared
            crate::handlers::common::MessageResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ComponentStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;
