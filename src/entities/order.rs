use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placed order. Rows are append-only; `movies` and `coupon_snapshot` freeze
/// the catalog and coupon terms that were in force at purchase time.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// JSON array of [`LineSnapshot`]
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Vec<LineSnapshot>)]
    pub movies: Json,
    /// JSON [`CouponSnapshot`], null when no coupon was applied
    #[sea_orm(column_type = "Json", nullable)]
    #[schema(value_type = Option<CouponSnapshot>)]
    pub coupon_snapshot: Option<Json>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn line_snapshots(&self) -> Result<Vec<LineSnapshot>, serde_json::Error> {
        serde_json::from_value(self.movies.clone())
    }

    pub fn coupon(&self) -> Result<Option<CouponSnapshot>, serde_json::Error> {
        self.coupon_snapshot
            .clone()
            .map(serde_json::from_value)
            .transpose()
    }
}

/// Informational only; pricing never depends on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// Movie fields frozen into an order line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieSnapshot {
    pub id: Uuid,
    pub title: String,
    pub cover_image: Option<String>,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineSnapshot {
    pub movie_snapshot: MovieSnapshot,
    pub quantity: i32,
    /// Unit price actually charged
    pub purchase_price: Decimal,
}

/// Coupon terms frozen into an order, including the thresholds that were checked
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponSnapshot {
    pub code: String,
    pub description: String,
    pub discount_amount: Decimal,
    pub is_percentage: bool,
    pub original_discount_value: Decimal,
    pub min_quantity: i32,
    pub min_subtotal: Decimal,
    pub min_order_count: i32,
    pub max_order_count: Option<i32>,
    pub specific_order_count: Option<i32>,
}
