use crate::{
    auth::AuthUser,
    entities::{order, Order, OrderModel},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of orders the user has already placed.
pub async fn count_prior_orders<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<u64, ServiceError> {
    Ok(Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .count(conn)
        .await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub orders: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponUsage {
    pub code: String,
    pub uses: u64,
    pub total_discount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderStats {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub coupon_usage: Vec<CouponUsage>,
}

/// Read side of placed orders. Orders are written only by checkout.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn count_prior_orders(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        count_prior_orders(&*self.db, user_id).await
    }

    /// The caller's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Fetches an order visible to `caller`. Other users' orders are reported
    /// as missing rather than forbidden.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn get_order(&self, id: Uuid, caller: &AuthUser) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|o| caller.is_admin() || o.user_id == caller.user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    /// All orders, newest first, optionally restricted to one user.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        user_id: Option<Uuid>,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Monthly revenue and coupon usage across all orders.
    #[instrument(skip(self))]
    pub async fn order_stats(&self) -> Result<OrderStats, ServiceError> {
        let orders = Order::find()
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(aggregate(&orders))
    }
}

fn aggregate(orders: &[OrderModel]) -> OrderStats {
    let mut monthly: BTreeMap<String, MonthlyRevenue> = BTreeMap::new();
    let mut coupons: BTreeMap<String, CouponUsage> = BTreeMap::new();
    let mut total_revenue = Decimal::ZERO;

    for order in orders {
        total_revenue += order.total;

        let month = order.created_at.format("%Y-%m").to_string();
        let bucket = monthly.entry(month.clone()).or_insert(MonthlyRevenue {
            month,
            orders: 0,
            revenue: Decimal::ZERO,
        });
        bucket.orders += 1;
        bucket.revenue += order.total;

        match order.coupon() {
            Ok(Some(snapshot)) => {
                let usage = coupons
                    .entry(snapshot.code.clone())
                    .or_insert(CouponUsage {
                        code: snapshot.code,
                        uses: 0,
                        total_discount: Decimal::ZERO,
                    });
                usage.uses += 1;
                usage.total_discount += snapshot.discount_amount;
            }
            Ok(None) => {}
            Err(e) => warn!(order_id = %order.id, error = %e, "unreadable coupon snapshot"),
        }
    }

    let mut coupon_usage: Vec<CouponUsage> = coupons.into_values().collect();
    coupon_usage.sort_by(|a, b| b.uses.cmp(&a.uses).then_with(|| a.code.cmp(&b.code)));

    OrderStats {
        total_orders: orders.len() as u64,
        total_revenue,
        monthly_revenue: monthly.into_values().collect(),
        coupon_usage,
    }
}
