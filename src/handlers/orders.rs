use super::common::{created_response, success_response};
use crate::{
    auth::AuthUser,
    entities::OrderModel,
    errors::ServiceError,
    handlers::AppState,
    services::checkout::PlaceOrderInput,
    ApiResponse,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Customer order routes; mounted behind authentication.
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/mine", get(my_orders))
        .route("/:id", get(get_order))
}

/// Places an order from the caller's cart. The body only names a coupon;
/// every amount is recomputed server-side. An empty body orders without a
/// coupon; anything else must be a well-formed `PlaceOrderInput`.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderInput,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderModel>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Empty cart or coupon rejected", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Movie unavailable or cart changed concurrently", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    body: Bytes,
) -> Result<Response, ServiceError> {
    let input = parse_order_body(&body)?;
    input.validate()?;

    let order = state
        .services
        .checkout
        .place_order(auth_user.user_id, input.coupon_code.as_deref())
        .await?;

    info!(order_id = %order.id, "order created via API");
    Ok(created_response(order))
}

fn parse_order_body(body: &[u8]) -> Result<PlaceOrderInput, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PlaceOrderInput::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid order request: {e}")))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses(
        (status = 200, description = "The caller's orders, newest first", body = ApiResponse<Vec<OrderModel>>),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders_for_user(auth_user.user_id)
        .await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its snapshots", body = ApiResponse<OrderModel>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get_order(id, &auth_user).await?;
    Ok(success_response(order))
}
