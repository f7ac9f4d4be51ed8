use crate::{
    entities::{coupon, coupon::normalize_code, Coupon, CouponModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::preview_cart,
        pricing::{CartTotals, CouponRejection, PricingEngine},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn default_min_quantity() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

/// Coupon definition as submitted by the back office. Used for both create
/// and full replacement.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CouponInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_value: Decimal,
    #[serde(default)]
    pub is_percentage: bool,
    #[serde(default = "default_min_quantity")]
    #[validate(range(min = 0))]
    pub min_quantity: i32,
    #[serde(default)]
    pub min_subtotal: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub min_order_count: i32,
    #[validate(range(min = 0))]
    pub max_order_count: Option<i32>,
    #[validate(range(min = 0))]
    pub specific_order_count: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CouponInput {
    /// Cross-field rules the derive cannot express.
    pub fn check_terms(&self) -> Result<(), ServiceError> {
        if self.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "code must not be blank".to_string(),
            ));
        }
        if self.discount_value < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount_value must not be negative".to_string(),
            ));
        }
        if self.is_percentage && self.discount_value > dec!(100) {
            return Err(ServiceError::ValidationError(
                "percentage discounts cannot exceed 100".to_string(),
            ));
        }
        if self.min_subtotal < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "min_subtotal must not be negative".to_string(),
            ));
        }
        if let Some(max) = self.max_order_count {
            if max < self.min_order_count {
                return Err(ServiceError::ValidationError(
                    "max_order_count must be at least min_order_count".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of checking a code against the caller's current cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponCheck {
    pub code: String,
    pub valid: bool,
    pub message: String,
    /// Present when the coupon was rejected
    pub rejection: Option<CouponRejection>,
    /// Cart totals with the coupon applied when valid, without it otherwise
    pub totals: CartTotals,
}

/// Resolves `code` to a coupon that is active and unexpired at `now`.
pub async fn find_active_coupon<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<CouponModel>, ServiceError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Ok(None);
    }

    let found = Coupon::find()
        .filter(coupon::Column::Code.eq(code))
        .filter(coupon::Column::Active.eq(true))
        .one(conn)
        .await?;

    // expiry is compared here rather than in SQL so the boundary is the same on every backend
    Ok(found.filter(|c| c.is_usable_at(now)))
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    pricing: PricingEngine,
}

impl CouponService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            db,
            event_sender,
            pricing,
        }
    }

    /// Active coupon lookup by code.
    #[instrument(skip(self))]
    pub async fn get_active_coupon(&self, code: &str) -> Result<CouponModel, ServiceError> {
        find_active_coupon(&*self.db, code, Utc::now())
            .await?
            .ok_or(ServiceError::InvalidCoupon(CouponRejection::NotFound))
    }

    /// Checks a code against the caller's cart and reports why it does not
    /// apply, if it does not.
    #[instrument(skip(self))]
    pub async fn check_coupon(&self, user_id: Uuid, code: &str) -> Result<CouponCheck, ServiceError> {
        let normalized = normalize_code(code);
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "code must not be blank".to_string(),
            ));
        }

        let preview = preview_cart(
            &*self.db,
            &self.pricing,
            user_id,
            Some(&normalized),
            Utc::now(),
        )
        .await?;

        let pricing = preview.pricing.ok_or(ServiceError::EmptyCart)?;

        let (valid, message) = match &pricing.rejection {
            None => (true, "Coupon applied".to_string()),
            Some(CouponRejection::NotFound) => (false, CouponRejection::NotFound.to_string()),
            Some(reason) => (false, format!("Coupon conditions not met: {reason}")),
        };

        Ok(CouponCheck {
            code: normalized,
            valid,
            message,
            rejection: pricing.rejection,
            totals: pricing.totals,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_coupons(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<CouponModel>, u64), ServiceError> {
        let paginator = Coupon::find()
            .order_by_asc(coupon::Column::Code)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((coupons, total))
    }

    #[instrument(skip(self))]
    pub async fn get_coupon(&self, id: Uuid) -> Result<CouponModel, ServiceError> {
        Coupon::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create_coupon(&self, input: CouponInput) -> Result<CouponModel, ServiceError> {
        input.validate()?;
        input.check_terms()?;
        let code = normalize_code(&input.code);

        let txn = self.db.begin().await?;
        ensure_code_free(&txn, &code, None).await?;

        let now = Utc::now();
        let coupon = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            created_at: Set(now),
            ..apply_terms(input, now)
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CouponCreated {
                coupon_id: coupon.id,
                code: coupon.code.clone(),
            })
            .await;

        info!(coupon_id = %coupon.id, code = %coupon.code, "Created coupon");
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn update_coupon(
        &self,
        id: Uuid,
        input: CouponInput,
    ) -> Result<CouponModel, ServiceError> {
        input.validate()?;
        input.check_terms()?;
        let code = normalize_code(&input.code);

        let txn = self.db.begin().await?;
        let existing = Coupon::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))?;
        ensure_code_free(&txn, &code, Some(id)).await?;

        let now = Utc::now();
        let coupon = coupon::ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(existing.id),
            code: Set(code),
            created_at: sea_orm::ActiveValue::Unchanged(existing.created_at),
            ..apply_terms(input, now)
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CouponUpdated(coupon.id))
            .await;

        info!(coupon_id = %coupon.id, "Updated coupon");
        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }

        self.event_sender.send_or_log(Event::CouponDeleted(id)).await;
        info!(coupon_id = %id, "Deleted coupon");
        Ok(())
    }
}

async fn ensure_code_free<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut query = Coupon::find().filter(coupon::Column::Code.eq(code));
    if let Some(id) = except {
        query = query.filter(coupon::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Coupon code {} already exists",
            code
        )));
    }
    Ok(())
}

fn apply_terms(input: CouponInput, now: DateTime<Utc>) -> coupon::ActiveModel {
    coupon::ActiveModel {
        description: Set(input.description),
        discount_value: Set(input.discount_value),
        is_percentage: Set(input.is_percentage),
        min_quantity: Set(input.min_quantity),
        min_subtotal: Set(input.min_subtotal),
        min_order_count: Set(input.min_order_count),
        max_order_count: Set(input.max_order_count),
        specific_order_count: Set(input.specific_order_count),
        expires_at: Set(input.expires_at),
        active: Set(input.active),
        updated_at: Set(now),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn input() -> CouponInput {
        CouponInput {
            code: "spring25".into(),
            description: "Spring sale".into(),
            discount_value: dec!(25),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: Decimal::ZERO,
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: None,
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn valid_terms_pass() {
        assert!(input().validate().is_ok());
        assert!(input().check_terms().is_ok());
    }

    #[test]
    fn percentage_over_one_hundred_is_rejected() {
        let coupon = CouponInput {
            discount_value: dec!(101),
            ..input()
        };
        assert_matches!(coupon.check_terms(), Err(ServiceError::ValidationError(_)));

        let fixed = CouponInput {
            is_percentage: false,
            ..coupon
        };
        assert!(fixed.check_terms().is_ok());
    }

    #[test]
    fn negative_values_are_rejected() {
        let negative_discount = CouponInput {
            discount_value: dec!(-1),
            ..input()
        };
        assert!(negative_discount.check_terms().is_err());

        let negative_quantity = CouponInput {
            min_quantity: -1,
            ..input()
        };
        assert!(negative_quantity.validate().is_err());
    }

    #[test]
    fn max_order_count_below_min_is_rejected() {
        let coupon = CouponInput {
            min_order_count: 5,
            max_order_count: Some(3),
            ..input()
        };
        assert!(coupon.check_terms().is_err());
    }

    #[test]
    fn blank_code_is_rejected() {
        let coupon = CouponInput {
            code: "   ".into(),
            ..input()
        };
        assert!(coupon.check_terms().is_err());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let parsed: CouponInput =
            serde_json::from_str(r#"{"code":"x","discount_value":"5"}"#).unwrap();
        assert_eq!(parsed.min_quantity, 1);
        assert!(parsed.active);
        assert!(!parsed.is_percentage);
        assert_eq!(parsed.description, "");
    }
}
