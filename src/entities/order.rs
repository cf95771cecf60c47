use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub line_items: LineItems,
    /// Total in major currency units
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_price: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a catalog product taken when the order was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LineItems(pub Vec<LineItem>);

impl LineItems {
    pub fn total(&self) -> Decimal {
        self.0.iter().map(LineItem::subtotal).sum()
    }
}

/// Payment lifecycle of an order.
///
/// `Pending` is the only non-terminal state; it moves exactly once to
/// `Successed` or `Failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "SUCCESSED")]
    Successed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Successed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Successed => "SUCCESSED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::auth::user::Entity",
        from = "Column::UserId",
        to = "crate::auth::user::Column::Id"
    )]
    User,
}

impl Related<crate::auth::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(PaymentStatus::Pending, PaymentStatus::Successed, true)]
    #[case(PaymentStatus::Pending, PaymentStatus::Failed, true)]
    #[case(PaymentStatus::Pending, PaymentStatus::Pending, false)]
    #[case(PaymentStatus::Successed, PaymentStatus::Failed, false)]
    #[case(PaymentStatus::Failed, PaymentStatus::Successed, false)]
    #[case(PaymentStatus::Successed, PaymentStatus::Pending, false)]
    fn transitions_leave_pending_only(
        #[case] from: PaymentStatus,
        #[case] to: PaymentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn serializes_with_storefront_spelling() {
        assert_eq!(
            serde_json::to_value(PaymentStatus::Successed).unwrap(),
            serde_json::json!("SUCCESSED")
        );
    }

    #[test]
    fn total_sums_unit_price_times_quantity() {
        let items = LineItems(vec![
            LineItem {
                product_id: Uuid::new_v4(),
                title: "Serum".into(),
                unit_price: dec!(10.99),
                quantity: 2,
                image: None,
            },
            LineItem {
                product_id: Uuid::new_v4(),
                title: "Toner".into(),
                unit_price: dec!(5.00),
                quantity: 1,
                image: None,
            },
        ]);
        assert_eq!(items.total(), dec!(26.98));
    }
}
