use axum::{
    extract::{Query, State},
    response::{Json, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{created_response, list_response, no_content_response, IdPath, JsonBody};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::commerce::catalog::{
        CreateProductInput, ProductFilter, ProductResponse, UpdateProductInput,
    },
    AppState,
};

/// Query parameters for the product listing
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Only products in this category
    pub category_id: Option<Uuid>,
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, at most 100
    pub limit: Option<u64>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category_id: query.category_id,
            page: query.page,
            limit: query.limit,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Products, with the unpaginated total in x-total-count", body = [ProductResponse]),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Response, ServiceError> {
    let (products, total) = state.services.catalog.list_products(query.into()).await?;
    let items: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(list_response(items, total))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    IdPath(product_id): IdPath,
) -> Result<Json<ProductResponse>, ServiceError> {
    let product = state.services.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    JsonBody(input): JsonBody<CreateProductInput>,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(ProductResponse::from(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid product data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(product_id): IdPath,
    JsonBody(input): JsonBody<UpdateProductInput>,
) -> Result<Json<ProductResponse>, ServiceError> {
    auth_user.require_admin()?;
    let product = state
        .services
        .catalog
        .update_product(product_id, input)
        .await?;
    Ok(Json(product.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    params(("id" = uuid::Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(product_id): IdPath,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    state.services.catalog.delete_product(product_id).await?;
    Ok(no_content_response())
}
