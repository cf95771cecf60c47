use crate::{
    auth::user::{self, Entity as UserEntity},
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, LineItems,
        Model as OrderModel, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order as exposed over HTTP
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub products: Vec<order::LineItem>,
    pub total_price: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            user: model.user_id,
            products: model.line_items.0,
            total_price: model.total_price.round_dp(2),
            currency: model.currency,
            payment_status: model.payment_status,
            checkout_session_id: model.checkout_session_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Result of a payment status transition request
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: OrderModel,
    /// `false` when the order was already in the requested state
    pub changed: bool,
}

/// Service for managing orders and their payment lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send_or_log(event).await;
        }
    }

    /// Retrieves an order by ID
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Lists all orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Lists the orders placed by one user, oldest first
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?;
        Ok(orders)
    }

    /// Persists a PENDING order and links it to its owner.
    ///
    /// The order row and the user's order list are written in one
    /// transaction, so a failure leaves neither behind.
    #[instrument(skip(self, line_items), fields(items = line_items.0.len()))]
    pub async fn create_pending_order(
        &self,
        user_id: Uuid,
        line_items: LineItems,
        currency: &str,
    ) -> Result<OrderModel, ServiceError> {
        if line_items.0.is_empty() {
            return Err(ServiceError::BadRequest(
                "An order needs at least one item".to_string(),
            ));
        }

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let owner = UserEntity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Account no longer exists".to_string()))?;
        if owner.ban_status {
            return Err(ServiceError::Forbidden(
                "This account has been banned".to_string(),
            ));
        }

        let now = Utc::now();
        let total = round_to_cents(line_items.total());

        let saved = OrderActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            line_items: Set(line_items),
            total_price: Set(total),
            currency: Set(currency.to_ascii_lowercase()),
            payment_status: Set(PaymentStatus::Pending),
            checkout_session_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert order");
            ServiceError::from(e)
        })?;

        let mut order_ids = owner.order_ids.clone();
        order_ids.push(saved.id);
        let mut owner = owner.into_active_model();
        owner.order_ids = Set(order_ids);
        owner.updated_at = Set(now);
        owner.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %saved.id, %user_id, total = %saved.total_price, "Order created");
        self.emit(Event::OrderCreated {
            order_id: saved.id,
            user_id,
        })
        .await;

        Ok(saved)
    }

    /// Stores the provider's checkout session id on the order
    #[instrument(skip(self))]
    pub async fn record_checkout_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(
                order::Column::CheckoutSessionId,
                Expr::value(session_id.to_string()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .exec(&*self.db_pool)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }

        self.emit(Event::CheckoutSessionCreated {
            order_id,
            session_id: session_id.to_string(),
        })
        .await;
        Ok(())
    }

    /// Moves a PENDING order to a terminal payment status.
    ///
    /// Repeating the transition the order already went through is a no-op;
    /// any other move out of a terminal state is a conflict. The update is
    /// conditional on the row still being PENDING.
    #[instrument(skip(self))]
    pub async fn transition_payment_status(
        &self,
        order_id: Uuid,
        target: PaymentStatus,
    ) -> Result<TransitionOutcome, ServiceError> {
        let current = self.get_order(order_id).await?;
        if let Some(outcome) = Self::settled_outcome(current, target)? {
            return Ok(outcome);
        }

        let result = OrderEntity::update_many()
            .col_expr(order::Column::PaymentStatus, Expr::value(target))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(&*self.db_pool)
            .await?;

        let updated = self.get_order(order_id).await?;
        if result.rows_affected == 0 {
            // Lost a race with another callback; judge against what it wrote.
            warn!(%order_id, current = %updated.payment_status, "Concurrent payment status update");
            return Self::settled_outcome(updated, target)?.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Order {} payment status did not change",
                    order_id
                ))
            });
        }

        info!(%order_id, status = %target, "Order payment status updated");
        match target {
            PaymentStatus::Successed => self.emit(Event::PaymentSucceeded(order_id)).await,
            PaymentStatus::Failed => self.emit(Event::PaymentFailed(order_id)).await,
            PaymentStatus::Pending => {}
        }

        Ok(TransitionOutcome {
            order: updated,
            changed: true,
        })
    }

    /// `Some` when no write is needed, `None` when the order is still PENDING.
    fn settled_outcome(
        order: OrderModel,
        target: PaymentStatus,
    ) -> Result<Option<TransitionOutcome>, ServiceError> {
        if order.payment_status == target {
            return Ok(Some(TransitionOutcome {
                order,
                changed: false,
            }));
        }
        if !order.payment_status.can_transition_to(target) {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already {}",
                order.id, order.payment_status
            )));
        }
        Ok(None)
    }

    /// Deletes an order and unlinks it from its owner
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await.map_err(ServiceError::DatabaseError)?;

        let existing = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if let Some(owner) = UserEntity::find_by_id(existing.user_id).one(&txn).await? {
            let mut order_ids = owner.order_ids.clone();
            if order_ids.remove(order_id) {
                let mut owner: user::ActiveModel = owner.into_active_model();
                owner.order_ids = Set(order_ids);
                owner.updated_at = Set(Utc::now());
                owner.update(&txn).await?;
            }
        }

        OrderEntity::delete_by_id(order_id).exec(&txn).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(%order_id, "Order deleted");
        self.emit(Event::OrderDeleted(order_id)).await;
        Ok(())
    }
}

/// Converts a major-unit amount into the provider's integer minor units.
/// Round a money amount to whole cents, half away from zero.
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    use rust_decimal::prelude::ToPrimitive;

    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ServiceError::BadRequest(format!("Amount {} is out of range", amount)))
}
