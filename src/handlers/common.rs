use crate::errors::{ApiError, ServiceError};
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::HeaderName, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// JSON array response carrying the unpaginated total in `x-total-count`
pub fn list_response<T: Serialize>(items: Vec<T>, total: u64) -> Response {
    let mut response = Json(items).into_response();
    if let Ok(value) = HeaderValue::from_str(&total.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TOTAL_COUNT_HEADER), value);
    }
    response
}

/// Plain `{message}` body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `Json` extractor whose rejections use the API error body
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::BadRequest {
                message: rejection.body_text(),
                error_code: Some("INVALID_JSON".to_string()),
            }),
        }
    }
}

/// Single `{id}` path segment parsed as a UUID.
///
/// Anything that is not a UUID cannot name a record, so it is reported as
/// not found.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let wrong_format = || ServiceError::NotFound("wrong id format".to_string());
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| wrong_format())?;
        Uuid::parse_str(raw.trim())
            .map(IdPath)
            .map_err(|_| wrong_format())
    }
}

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Page and limit clamped to sane bounds
    pub fn normalized(&self) -> (u64, u64) {
        (self.page.max(1), self.limit.clamp(1, 100))
    }
}
