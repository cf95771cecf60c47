use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{created_response, no_content_response, IdPath, JsonBody, MessageResponse};
use crate::{
    auth::{AuthUser, UserRole},
    errors::ServiceError,
    services::accounts::{
        LoginInput, LoginResponse, PasswordResetConfirmInput, PasswordResetRequestInput,
        RegisterUserInput, UpdateUserInput, UserResponse,
    },
    AppState,
};

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent.";

/// Result of a ban or unban
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BanResponse {
    pub message: String,
    pub user: UserResponse,
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Register",
    request_body = RegisterUserInput,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid registration data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterUserInput>,
) -> Result<Response, ServiceError> {
    let user = state
        .services
        .accounts
        .register(input, UserRole::Customer)
        .await?;
    Ok(created_response(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    summary = "Log in",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Wrong password", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account banned", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown email", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> Result<Json<LoginResponse>, ServiceError> {
    Ok(Json(state.services.accounts.login(input).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List users",
    responses(
        (status = 200, description = "All accounts", body = [UserResponse]),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<UserResponse>>, ServiceError> {
    auth_user.require_admin()?;
    let users = state.services.accounts.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    summary = "Current account",
    responses(
        (status = 200, description = "The caller's account", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserResponse>, ServiceError> {
    let user = state
        .services
        .accounts
        .get_user(auth_user.user_id)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => {
                ServiceError::Unauthorized("Account no longer exists".to_string())
            }
            other => other,
        })?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 403, description = "Not your account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
) -> Result<Json<UserResponse>, ServiceError> {
    auth_user.require_self_or_admin(user_id)?;
    let user = state.services.accounts.get_user(user_id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    summary = "Update profile",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid profile data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not your account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
    JsonBody(input): JsonBody<UpdateUserInput>,
) -> Result<Json<UserResponse>, ServiceError> {
    auth_user.require_self_or_admin(user_id)?;
    let user = state.services.accounts.update_user(user_id, input).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    summary = "Delete user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
) -> Result<Response, ServiceError> {
    auth_user.require_admin()?;
    state.services.accounts.delete_user(user_id).await?;
    Ok(no_content_response())
}

async fn set_ban(
    state: &AppState,
    auth_user: &AuthUser,
    user_id: uuid::Uuid,
    banned: bool,
) -> Result<Json<BanResponse>, ServiceError> {
    auth_user.require_admin()?;
    if banned && auth_user.user_id == user_id {
        return Err(ServiceError::BadRequest(
            "Administrators cannot ban themselves".to_string(),
        ));
    }
    let user = state
        .services
        .accounts
        .set_ban_status(user_id, banned)
        .await?;
    let message = if banned {
        "User banned successfully!"
    } else {
        "User unbanned successfully!"
    };
    Ok(Json(BanResponse {
        message: message.to_string(),
        user: user.into(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/ban",
    summary = "Ban user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User banned", body = BanResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn ban_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
) -> Result<Json<BanResponse>, ServiceError> {
    set_ban(&state, &auth_user, user_id, true).await
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/unban",
    summary = "Unban user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User unbanned", body = BanResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn unban_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    IdPath(user_id): IdPath,
) -> Result<Json<BanResponse>, ServiceError> {
    set_ban(&state, &auth_user, user_id, false).await
}

#[utoipa::path(
    post,
    path = "/api/v1/users/password-reset",
    summary = "Request password reset",
    description = "Sends a one-time reset token out of band. The response is the same whether or not the email is registered.",
    request_body = PasswordResetRequestInput,
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Malformed email", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<PasswordResetRequestInput>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .accounts
        .request_password_reset(input)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/password-reset/confirm",
    summary = "Confirm password reset",
    request_body = PasswordResetConfirmInput,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::errors::ErrorResponse),
    ),
    tag = "Users"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<PasswordResetConfirmInput>,
) -> Result<Json<MessageResponse>, ServiceError> {
    state
        .services
        .accounts
        .confirm_password_reset(input)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
