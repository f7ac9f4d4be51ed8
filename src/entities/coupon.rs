use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Coupon definition. `code` is stored uppercase.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "coupons")]
#[schema(as = Coupon)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub discount_value: Decimal,
    pub is_percentage: bool,
    pub min_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub min_subtotal: Decimal,
    pub min_order_count: i32,
    #[sea_orm(nullable)]
    pub max_order_count: Option<i32>,
    /// When set, the coupon applies only when the prior-order count matches
    /// exactly; the min/max order counts are then ignored.
    #[sea_orm(nullable)]
    pub specific_order_count: Option<i32>,
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Active and not past its expiry. The boundary instant is still valid.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |expires_at| expires_at >= now)
    }
}

/// Canonical form of a coupon code as stored and looked up.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
