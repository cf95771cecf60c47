use axum::{
    extract::State,
    response::{Json, Response},
};

use super::common::{created_response, no_content_response, IdPath, JsonBody};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::commerce::catalog::{CategoryResponse, CreateCategoryInput, UpdateCategoryInput},
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    responses((status = 200, description = "Categories by name", body = [CategoryResponse])),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    summary = "Get category",
    params(("id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    IdPath(category_id): IdPath,
) -> Result<Json<CategoryResponse>, ServiceError> {
    let category = state.services.catalog.get_category(category_id).await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create category",
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid category data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category name taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    JsonBody(input): JsonBody<CreateCategoryInput>,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    let category = state.services.catalog.create_category(input).await?;
    Ok(created_response(CategoryResponse::from(category)))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    summary = "Update category",
    params(("id" = uuid::Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryInput,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(category_id): IdPath,
    JsonBody(input): JsonBody<UpdateCategoryInput>,
) -> Result<Json<CategoryResponse>, ServiceError> {
    auth_user.require_admin()?;
    let category = state
        .services
        .catalog
        .update_category(category_id, input)
        .await?;
    Ok(Json(category.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete category",
    params(("id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still has products", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(category_id): IdPath,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    state.services.catalog.delete_category(category_id).await?;
    Ok(no_content_response())
}
