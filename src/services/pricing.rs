//! Cart pricing and coupon eligibility.
//!
//! Pure computation: callers load the cart lines, catalog rows, the resolved
//! coupon and the buyer's prior-order count, then hand them here together
//! with the evaluation instant. Identical inputs always produce identical
//! output, which is what lets checkout re-derive the totals a shopper saw in
//! the cart preview instead of trusting numbers sent by the client.
//!
//! Two entry points encode the two coupon policies:
//!
//! * [`PricingEngine::preview`] never fails. Missing movies are skipped and an
//!   unusable coupon is simply not applied; the reason is kept on the
//!   [`PreviewResult`] for callers that want to surface it.
//! * [`PricingEngine::commit`] is strict. A missing movie or a supplied coupon
//!   that cannot be applied rejects the whole computation.

use crate::config::AppConfig;
use crate::entities::{coupon, movie};
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sales tax applied to the post-discount amount.
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.08);

const ONE_HUNDRED: Decimal = dec!(100);

/// Rounds a monetary amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One cart line as loaded from storage. `movie` is `None` when the
/// referenced catalog row no longer exists.
#[derive(Debug, Clone, Copy)]
pub struct LineInput<'a> {
    pub movie_id: Uuid,
    pub movie: Option<&'a movie::Model>,
    pub quantity: i32,
}

/// A line that was priced against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PricedLine {
    pub movie: movie::Model,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Coupon summary attached to totals when a discount was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub description: String,
    pub discount_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub total_quantity: i64,
    pub applied_coupon: Option<AppliedCoupon>,
}

/// Why a coupon was not applied. The display strings are shown to shoppers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Invalid or expired coupon")]
    NotFound,
    #[error("Requires at least {required} items in cart")]
    BelowMinQuantity { required: i32 },
    #[error("Requires minimum subtotal of ${required}")]
    BelowMinSubtotal { required: Decimal },
    #[error("Valid only after {required} previous orders")]
    BelowMinOrderCount { required: i32 },
    #[error("Valid only for customers with at most {allowed} previous orders")]
    AboveMaxOrderCount { allowed: i32 },
    #[error("Valid only when exactly {required} previous orders have been placed")]
    OrderCountMismatch { required: i32 },
}

/// Lenient pricing outcome used by the cart view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResult {
    pub lines: Vec<PricedLine>,
    pub totals: CartTotals,
    /// Set when a coupon was supplied but not applied.
    pub rejection: Option<CouponRejection>,
}

impl PreviewResult {
    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> {
        self.totals.applied_coupon.as_ref()
    }
}

/// Strict pricing outcome used by order placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedPricing {
    pub lines: Vec<PricedLine>,
    pub totals: CartTotals,
    pub coupon: Option<coupon::Model>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinePricing {
    lines: Vec<PricedLine>,
    subtotal: Decimal,
    total_quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    tax_rate: Decimal,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TAX_RATE)
    }
}

impl PricingEngine {
    pub fn new(tax_rate: Decimal) -> Self {
        Self { tax_rate }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let tax_rate = Decimal::from_f64(config.default_tax_rate)
            .map(|rate| rate.round_dp(6))
            .unwrap_or(DEFAULT_TAX_RATE);
        Self::new(tax_rate)
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Prices a cart for display. Never fails.
    pub fn preview(
        &self,
        lines: &[LineInput<'_>],
        coupon: Option<&coupon::Model>,
        prior_orders: u64,
        now: DateTime<Utc>,
    ) -> PreviewResult {
        let pricing = Self::price_available(lines);

        let (applied, rejection) = match coupon {
            None => (None, None),
            Some(coupon) => match self.evaluate_coupon(
                coupon,
                pricing.subtotal,
                pricing.total_quantity,
                prior_orders,
                now,
            ) {
                Ok(discount) => (Some((coupon, discount)), None),
                Err(reason) => (None, Some(reason)),
            },
        };

        PreviewResult {
            totals: self.totals(&pricing, applied),
            lines: pricing.lines,
            rejection,
        }
    }

    /// Prices a cart for purchase.
    ///
    /// `requested_code` is the code the shopper typed (if any) and `coupon`
    /// the active coupon the store resolved for it. A code that resolved to
    /// nothing, an expired coupon, and a coupon whose thresholds are not met
    /// all reject with [`ServiceError::InvalidCoupon`].
    pub fn commit(
        &self,
        lines: &[LineInput<'_>],
        requested_code: Option<&str>,
        coupon: Option<&coupon::Model>,
        prior_orders: u64,
        now: DateTime<Utc>,
    ) -> Result<CommittedPricing, ServiceError> {
        let pricing = Self::price_all(lines)?;
        if pricing.lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let applied = match (requested_code, coupon) {
            (None, _) => None,
            (Some(_), None) => return Err(ServiceError::InvalidCoupon(CouponRejection::NotFound)),
            (Some(_), Some(coupon)) => {
                let discount = self
                    .evaluate_coupon(
                        coupon,
                        pricing.subtotal,
                        pricing.total_quantity,
                        prior_orders,
                        now,
                    )
                    .map_err(ServiceError::InvalidCoupon)?;
                Some((coupon, discount))
            }
        };

        Ok(CommittedPricing {
            totals: self.totals(&pricing, applied),
            coupon: applied.map(|(coupon, _)| coupon.clone()),
            lines: pricing.lines,
        })
    }

    /// Checks usability and every eligibility threshold, returning the
    /// discount the coupon would grant on `subtotal`.
    pub fn evaluate_coupon(
        &self,
        coupon: &coupon::Model,
        subtotal: Decimal,
        total_quantity: i64,
        prior_orders: u64,
        now: DateTime<Utc>,
    ) -> Result<Decimal, CouponRejection> {
        if !coupon.is_usable_at(now) {
            return Err(CouponRejection::NotFound);
        }
        check_eligibility(coupon, subtotal, total_quantity, prior_orders)?;
        Ok(discount_amount(coupon, subtotal))
    }

    /// Prices every line whose movie still exists; the rest are skipped.
    fn price_available(lines: &[LineInput<'_>]) -> LinePricing {
        let mut priced = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;
        let mut total_quantity: i64 = 0;

        for line in lines {
            let Some(movie) = line.movie else {
                continue;
            };

            let unit_price = movie.effective_price();
            let line_total = unit_price * Decimal::from(line.quantity);
            subtotal += line_total;
            total_quantity += i64::from(line.quantity);

            priced.push(PricedLine {
                movie: movie.clone(),
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        LinePricing {
            lines: priced,
            subtotal,
            total_quantity,
        }
    }

    /// Prices every line, failing on the first one whose movie is gone.
    fn price_all(lines: &[LineInput<'_>]) -> Result<LinePricing, ServiceError> {
        if let Some(missing) = lines.iter().find(|line| line.movie.is_none()) {
            return Err(ServiceError::ItemUnavailable(missing.movie_id));
        }
        Ok(Self::price_available(lines))
    }

    fn totals(
        &self,
        pricing: &LinePricing,
        applied: Option<(&coupon::Model, Decimal)>,
    ) -> CartTotals {
        let discount = applied.map_or(Decimal::ZERO, |(_, discount)| discount);
        let taxable = pricing.subtotal - discount;
        let tax = round_money(taxable * self.tax_rate);

        CartTotals {
            subtotal: pricing.subtotal,
            discount_amount: discount,
            tax,
            total: taxable + tax,
            total_quantity: pricing.total_quantity,
            applied_coupon: applied.map(|(coupon, discount)| AppliedCoupon {
                code: coupon.code.clone(),
                description: coupon.description.clone(),
                discount_amount: discount,
            }),
        }
    }
}

/// Threshold checks, first failure wins. A set `specific_order_count`
/// replaces the min/max order-count checks.
pub fn check_eligibility(
    coupon: &coupon::Model,
    subtotal: Decimal,
    total_quantity: i64,
    prior_orders: u64,
) -> Result<(), CouponRejection> {
    if total_quantity < i64::from(coupon.min_quantity) {
        return Err(CouponRejection::BelowMinQuantity {
            required: coupon.min_quantity,
        });
    }

    if subtotal < coupon.min_subtotal {
        return Err(CouponRejection::BelowMinSubtotal {
            required: coupon.min_subtotal,
        });
    }

    let prior = i64::try_from(prior_orders).unwrap_or(i64::MAX);

    if let Some(required) = coupon.specific_order_count {
        if prior != i64::from(required) {
            return Err(CouponRejection::OrderCountMismatch { required });
        }
        return Ok(());
    }

    if prior < i64::from(coupon.min_order_count) {
        return Err(CouponRejection::BelowMinOrderCount {
            required: coupon.min_order_count,
        });
    }

    if let Some(allowed) = coupon.max_order_count {
        if prior > i64::from(allowed) {
            return Err(CouponRejection::AboveMaxOrderCount { allowed });
        }
    }

    Ok(())
}

/// Discount granted on `subtotal`, never more than `subtotal` itself.
pub fn discount_amount(coupon: &coupon::Model, subtotal: Decimal) -> Decimal {
    let raw = if coupon.is_percentage {
        round_money(subtotal * coupon.discount_value / ONE_HUNDRED)
    } else {
        coupon.discount_value
    };
    raw.max(Decimal::ZERO).min(subtotal)
}
