/*!
 * # Authentication and Authorization Module
 *
 * Bearer-token authentication for the storefront API:
 *
 * - HS256 JWTs carrying `{_id, email, role}` with a fixed lifetime
 * - Argon2 password hashing (see [`password`])
 * - The [`AuthUser`] extractor, which rejects requests without a valid token
 *
 * Account records themselves live in [`user`]; one-time password reset
 * tokens in [`password_reset_token`].
 */

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod password;
pub mod password_reset_token;
pub mod user;

pub use user::UserRole;

/// Claim structure for access tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingAuth,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token signing failed: {0}")]
    SigningFailed(String),
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SigningFailed(msg) => ServiceError::JwtError(msg),
            AuthError::HashingFailed(msg) => ServiceError::HashError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Token settings derived from `AppConfig`
#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: String,
    issuer: String,
    audience: String,
    token_ttl: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, issuer: String, audience: String, token_ttl: Duration) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            token_ttl,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

/// Freshly minted access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Issues and verifies access tokens
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Mint a token for an authenticated account.
    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now().timestamp();
        let expires_at = now + self.config.token_ttl.as_secs() as i64;
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Verify signature, expiry, issuer and audience.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "rejected access token");
                    AuthError::InvalidToken
                }
            })
    }
}

/// Pull the raw token out of an `Authorization: Bearer ...` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

/// Authenticated caller, decoded from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator role required".to_string(),
            ))
        }
    }

    /// Allow the account owner or an administrator.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You can only access your own account".to_string(),
            ))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.user_id).map_err(|_| AuthError::InvalidToken)?;
        let role = UserRole::parse(&claims.role).ok_or(AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            email: claims.email,
            role,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let token = extract_bearer_token(&parts.headers)?;
        let claims = auth.validate_token(token)?;
        Ok(AuthUser::try_from(claims)?)
    }
}
