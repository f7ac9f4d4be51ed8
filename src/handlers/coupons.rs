use super::common::success_response;
use crate::{
    auth::AuthUser, entities::CouponModel, errors::ServiceError, handlers::AppState,
    services::coupons::CouponCheck, ApiResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

/// Customer-facing coupon routes; mounted behind authentication.
pub fn coupons_routes() -> Router<AppState> {
    Router::new()
        .route("/apply", get(apply_coupon))
        .route("/code/:code", get(get_coupon_by_code))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ApplyQuery {
    pub code: String,
}

/// Checks a code against the caller's cart. An unusable coupon is not an
/// error here: the response says why it does not apply.
#[utoipa::path(
    get,
    path = "/api/v1/coupons/apply",
    params(ApplyQuery),
    responses(
        (status = 200, description = "Eligibility and resulting totals", body = ApiResponse<CouponCheck>),
        (status = 400, description = "Empty cart or blank code", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "coupons"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ApplyQuery>,
) -> Result<Response, ServiceError> {
    let check = state
        .services
        .coupons
        .check_coupon(auth_user.user_id, &query.code)
        .await?;
    Ok(success_response(check))
}

#[utoipa::path(
    get,
    path = "/api/v1/coupons/code/{code}",
    params(("code" = String, Path, description = "Coupon code, case-insensitive")),
    responses(
        (status = 200, description = "Active coupon", body = ApiResponse<CouponModel>),
        (status = 400, description = "Invalid or expired coupon", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "coupons"
)]
pub async fn get_coupon_by_code(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(code): Path<String>,
) -> Result<Response, ServiceError> {
    let coupon = state.services.coupons.get_active_coupon(&code).await?;
    Ok(success_response(coupon))
}
