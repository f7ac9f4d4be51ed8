use super::common::{no_content_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::AppState,
    services::{
        cart::{AddCartItemInput, CartView, UpdateCartItemInput},
        pricing::CartTotals,
    },
    ApiResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Routes for the caller's own cart; mounted behind authentication.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_cart)
                .post(add_item)
                .patch(update_item)
                .delete(clear_cart),
        )
        .route("/current", get(current_totals))
        .route("/items/:movie_id", delete(remove_item))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CouponQuery {
    /// Coupon code to preview; unusable codes are ignored
    pub coupon: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    params(CouponQuery),
    responses(
        (status = 200, description = "Cart with live movie data and preview totals", body = ApiResponse<CartView>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<CouponQuery>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .get_cart(auth_user.user_id, query.coupon.as_deref())
        .await?;
    Ok(success_response(cart))
}

/// Preview totals only. `data` is null for an empty cart.
#[utoipa::path(
    get,
    path = "/api/v1/cart/current",
    params(CouponQuery),
    responses(
        (status = 200, description = "Preview totals", body = ApiResponse<CartTotals>),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn current_totals(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<CouponQuery>,
) -> Result<Response, ServiceError> {
    let totals = state
        .services
        .cart
        .compute_cart_totals(auth_user.user_id, query.coupon.as_deref())
        .await?;
    Ok(success_response(totals))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartView>),
        (status = 404, description = "Movie not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<AddCartItemInput>,
) -> Result<Response, ServiceError> {
    let cart = state.services.cart.add_item(auth_user.user_id, input).await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    patch,
    path = "/api/v1/cart",
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartView>),
        (status = 404, description = "Line not in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<UpdateCartItemInput>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .update_item(auth_user.user_id, input)
        .await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{movie_id}",
    params(("movie_id" = Uuid, Path, description = "Movie to drop from the cart")),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartView>),
        (status = 404, description = "Line not in cart", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(movie_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(auth_user.user_id, movie_id)
        .await?;
    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 204, description = "Cart emptied")),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    state.services.cart.clear(auth_user.user_id).await?;
    Ok(no_content_response())
}
