use axum::{
    extract::{Query, State},
    response::{Json, Response},
};

use super::common::{list_response, no_content_response, IdPath, PaginationParams};
use crate::{
    auth::AuthUser, errors::ServiceError, services::orders::OrderResponse, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "All orders, newest first. The unpaginated total is returned in x-total-count.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders", body = [OrderResponse]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    let (page, limit) = params.normalized();
    let (orders, total) = state.services.orders.list_orders(page, limit).await?;
    let items: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(list_response(items, total))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/user/{userId}",
    summary = "List a user's orders",
    params(("userId" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Orders placed by the user, oldest first", body = [OrderResponse]),
        (status = 403, description = "Not your account", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
) -> Result<Json<Vec<OrderResponse>>, ServiceError> {
    auth_user.require_self_or_admin(user_id)?;
    let orders = state.services.orders.list_orders_for_user(user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = uuid::Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(order_id): IdPath,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order = state.services.orders.get_order(order_id).await?;
    if order.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "You can only access your own orders".to_string(),
        ));
    }
    Ok(Json(order.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = uuid::Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted and unlinked from its owner"),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(order_id): IdPath,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    state.services.orders.delete_order(order_id).await?;
    Ok(no_content_response())
}
