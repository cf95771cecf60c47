use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        password_reset_token::{self, Entity as ResetTokenEntity},
        user::{self, Entity as UserEntity, Model as UserModel, OrderRefs},
        AuthService, UserRole,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const RESET_TOKEN_LENGTH: usize = 48;

pub const WRONG_PASSWORD_MESSAGE: &str = "Wrong password, please try again!";

/// Input for registering an account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterUserInput {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub firstname: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub lastname: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6 to 128 characters"))]
    pub password: String,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

/// Profile changes; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub lastname: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,
    #[validate(length(min = 6, max = 128, message = "Password must be 6 to 128 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequestInput {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirmInput {
    #[validate(length(equal = 48, message = "Invalid reset token"))]
    pub token: String,
    #[validate(length(min = 6, max = 128, message = "Password must be 6 to 128 characters"))]
    pub password: String,
}

/// Account as exposed over HTTP; never carries the password hash
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: UserRole,
    pub ban_status: bool,
    pub orders: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserModel> for UserResponse {
    fn from(model: UserModel) -> Self {
        Self {
            id: model.id,
            firstname: model.firstname,
            lastname: model.lastname,
            email: model.email,
            avatar: model.avatar,
            role: model.role,
            ban_status: model.ban_status,
            orders: model.order_ids.0,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_data: UserResponse,
    pub token: String,
}

/// Delivers password reset tokens out of band (mail, SMS, ...)
#[async_trait]
pub trait PasswordResetNotifier: Send + Sync {
    async fn send_reset_token(
        &self,
        user: &UserModel,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

/// Writes reset tokens to the debug log; for development deployments
/// without a mail transport.
pub struct LogResetNotifier;

#[async_trait]
impl PasswordResetNotifier for LogResetNotifier {
    async fn send_reset_token(
        &self,
        user: &UserModel,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        debug!(user_id = %user.id, email = %user.email, reset_token = %token, %expires_at, "Password reset token issued");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Account service: registration, credentials, profile and moderation
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn PasswordResetNotifier>,
    reset_ttl: Duration,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn PasswordResetNotifier>,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            db,
            auth,
            event_sender,
            notifier,
            reset_ttl,
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db)
            .await?)
    }

    /// Register a new account with the given role
    #[instrument(skip(self, input))]
    pub async fn register(
        &self,
        input: RegisterUserInput,
        role: UserRole,
    ) -> Result<UserModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::BadRequest(format!("Invalid registration: {}", e)))?;

        let email = normalize_email(&input.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = hash_password_blocking(input.password).await?;
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            firstname: Set(input.firstname.trim().to_string()),
            lastname: Set(input.lastname.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            avatar: Set(input.avatar),
            role: Set(role),
            ban_status: Set(false),
            order_ids: Set(OrderRefs::default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user.id))
            .await;
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify credentials and mint an access token
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginResponse, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::BadRequest(format!("Invalid login: {}", e)))?;

        let user = self
            .find_by_email(&input.email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No account with this email".to_string()))?;

        let matches = verify_password_blocking(input.password, user.password_hash.clone()).await?;
        if !matches {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(ServiceError::BadRequest(WRONG_PASSWORD_MESSAGE.to_string()));
        }
        if user.ban_status {
            warn!(user_id = %user.id, "Login rejected: account banned");
            return Err(ServiceError::Forbidden(
                "This account has been banned".to_string(),
            ));
        }

        let issued = self.auth.generate_token(user.id, &user.email, user.role)?;
        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            user_data: user.into(),
            token: issued.token,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserModel, ServiceError> {
        UserEntity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn list_users(&self) -> Result<Vec<UserModel>, ServiceError> {
        Ok(UserEntity::find()
            .order_by_asc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Apply profile changes; a new password is re-hashed
    #[instrument(skip(self, input))]
    pub async fn update_user(
        &self,
        user_id: Uuid,
        input: UpdateUserInput,
    ) -> Result<UserModel, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::BadRequest(format!("Invalid profile update: {}", e)))?;

        let existing = self.get_user(user_id).await?;
        let current_email = existing.email.clone();
        let mut active = existing.into_active_model();

        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != current_email {
                if let Some(other) = self.find_by_email(&email).await? {
                    if other.id != user_id {
                        return Err(ServiceError::Conflict(
                            "Email already registered".to_string(),
                        ));
                    }
                }
                active.email = Set(email);
            }
        }
        if let Some(firstname) = input.firstname {
            active.firstname = Set(firstname.trim().to_string());
        }
        if let Some(lastname) = input.lastname {
            active.lastname = Set(lastname.trim().to_string());
        }
        if let Some(avatar) = input.avatar {
            active.avatar = Set(Some(avatar));
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password_blocking(password).await?);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    /// Remove an account and its outstanding reset tokens
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        ResetTokenEntity::delete_many()
            .filter(password_reset_token::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let result = UserEntity::delete_by_id(user_id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        self.event_sender
            .send_or_log(Event::UserDeleted(user_id))
            .await;
        info!(%user_id, "User deleted");
        Ok(())
    }

    /// Ban or unban an account
    #[instrument(skip(self))]
    pub async fn set_ban_status(
        &self,
        user_id: Uuid,
        banned: bool,
    ) -> Result<UserModel, ServiceError> {
        let mut active = self.get_user(user_id).await?.into_active_model();
        active.ban_status = Set(banned);
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        let event = if banned {
            Event::UserBanned(user_id)
        } else {
            Event::UserUnbanned(user_id)
        };
        self.event_sender.send_or_log(event).await;
        info!(%user_id, banned, "User ban status changed");
        Ok(user)
    }

    /// Issue a one-time reset token when the email belongs to an account.
    ///
    /// Returns `Ok(())` either way so callers cannot probe for accounts.
    #[instrument(skip(self, input))]
    pub async fn request_password_reset(
        &self,
        input: PasswordResetRequestInput,
    ) -> Result<(), ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::BadRequest(format!("Invalid request: {}", e)))?;

        let Some(user) = self.find_by_email(&input.email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.reset_ttl)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        ResetTokenEntity::delete_many()
            .filter(password_reset_token::Column::UserId.eq(user.id))
            .filter(password_reset_token::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;
        password_reset_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            token_hash: Set(hash_reset_token(&token)),
            expires_at: Set(expires_at),
            created_at: Set(now),
            used_at: Set(None),
        }
        .insert(&txn)
        .await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        if let Err(e) = self.notifier.send_reset_token(&user, &token, expires_at).await {
            error!(user_id = %user.id, error = %e, "Failed to deliver password reset token");
        }
        self.event_sender
            .send_or_log(Event::PasswordResetRequested(user.id))
            .await;
        Ok(())
    }

    /// Consume a reset token and set the new password
    #[instrument(skip(self, input))]
    pub async fn confirm_password_reset(
        &self,
        input: PasswordResetConfirmInput,
    ) -> Result<(), ServiceError> {
        let invalid = || ServiceError::BadRequest("Invalid or expired reset token".to_string());
        input.validate().map_err(|_| invalid())?;

        let now = Utc::now();
        let record = ResetTokenEntity::find()
            .filter(password_reset_token::Column::TokenHash.eq(hash_reset_token(&input.token)))
            .one(&*self.db)
            .await?
            .filter(|record| record.is_usable_at(now))
            .ok_or_else(invalid)?;

        let password_hash = hash_password_blocking(input.password).await?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        // Claiming the token is conditional so two confirmations cannot both succeed.
        let claimed = ResetTokenEntity::update_many()
            .col_expr(password_reset_token::Column::UsedAt, Expr::value(now))
            .filter(password_reset_token::Column::Id.eq(record.id))
            .filter(password_reset_token::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(invalid());
        }

        let user = UserEntity::find_by_id(record.user_id)
            .one(&txn)
            .await?
            .ok_or_else(invalid)?;
        let mut active = user.into_active_model();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(now);
        active.update(&txn).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::PasswordChanged(record.user_id))
            .await;
        info!(user_id = %record.user_id, "Password reset completed");
        Ok(())
    }
}
