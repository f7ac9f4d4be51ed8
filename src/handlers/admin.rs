//! Back office. Every route here is mounted behind `with_role(UserRole::Admin)`,
//! so handlers only take the [`AuthUser`] when they need the actor's identity.

use super::common::{
    created_response, no_content_response, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AuthUser,
    entities::{CouponModel, MovieModel, OrderModel, UserModel},
    errors::ServiceError,
    handlers::AppState,
    services::{
        catalog::{CreateMovieInput, MovieStatistics, UpdateMovieInput},
        coupons::CouponInput,
        orders::OrderStats,
        users::{
            BulkActionReport, BulkActionRequest, CreateUserInput, UpdateUserInput, UserStatistics,
        },
    },
    ApiResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/bulk-delete", post(delete_movies))
        .route(
            "/movies/:id",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
        .route("/statistics/movies", get(movie_statistics))
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/coupons/:id",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .route("/orders", get(list_orders))
        .route("/orders/stats", get(order_stats))
        .route("/orders/:id", get(get_order))
        .route("/users", get(list_users).post(create_user))
        .route("/users/bulk-actions", post(bulk_action))
        .route("/users/statistics", get(user_statistics))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/toggle-active", patch(toggle_active))
}

// Movies

#[utoipa::path(
    get,
    path = "/api/v1/admin/movies",
    params(PaginationParams),
    responses((status = 200, description = "Catalog page", body = ApiResponse<PaginatedResponse<MovieModel>>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = params.page();
    let per_page = state.config.clamp_page_size(params.per_page);
    let (movies, total) = state
        .services
        .catalog
        .list_movies(page, per_page, params.search.as_deref())
        .await?;
    Ok(success_response(PaginatedResponse::new(
        movies, page, per_page, total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/movies/{id}",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie", body = ApiResponse<MovieModel>),
        (status = 404, description = "Movie not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.catalog.get_movie(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/movies",
    request_body = CreateMovieInput,
    responses(
        (status = 201, description = "Movie created", body = ApiResponse<MovieModel>),
        (status = 400, description = "Invalid prices or quantity", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn create_movie(
    State(state): State<AppState>,
    Json(input): Json<CreateMovieInput>,
) -> Result<Response, ServiceError> {
    let movie = state.services.catalog.create_movie(input).await?;
    Ok(created_response(movie))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/movies/{id}",
    params(("id" = Uuid, Path, description = "Movie id")),
    request_body = UpdateMovieInput,
    responses(
        (status = 200, description = "Movie updated", body = ApiResponse<MovieModel>),
        (status = 404, description = "Movie not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateMovieInput>,
) -> Result<Response, ServiceError> {
    let movie = state.services.catalog.update_movie(id, input).await?;
    Ok(success_response(movie))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/movies/{id}",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 204, description = "Movie deleted"),
        (status = 404, description = "Movie not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_movie(id).await?;
    Ok(no_content_response())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 500))]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteResult {
    pub deleted: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/movies/bulk-delete",
    request_body = BulkDeleteRequest,
    responses((status = 200, description = "Number of movies removed", body = ApiResponse<BulkDeleteResult>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn delete_movies(
    State(state): State<AppState>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;
    let deleted = state.services.catalog.delete_movies(&request.ids).await?;
    Ok(success_response(BulkDeleteResult { deleted }))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/statistics/movies",
    responses((status = 200, description = "Catalog statistics", body = ApiResponse<MovieStatistics>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn movie_statistics(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(
        state.services.catalog.movie_statistics().await?,
    ))
}

// Coupons

#[utoipa::path(
    get,
    path = "/api/v1/admin/coupons",
    params(PaginationParams),
    responses((status = 200, description = "Coupons ordered by code", body = ApiResponse<PaginatedResponse<CouponModel>>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = params.page();
    let per_page = state.config.clamp_page_size(params.per_page);
    let (coupons, total) = state.services.coupons.list_coupons(page, per_page).await?;
    Ok(success_response(PaginatedResponse::new(
        coupons, page, per_page, total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    responses(
        (status = 200, description = "Coupon", body = ApiResponse<CouponModel>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.coupons.get_coupon(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/coupons",
    request_body = CouponInput,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<CouponModel>),
        (status = 400, description = "Invalid terms", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(input): Json<CouponInput>,
) -> Result<Response, ServiceError> {
    let coupon = state.services.coupons.create_coupon(input).await?;
    Ok(created_response(coupon))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    request_body = CouponInput,
    responses(
        (status = 200, description = "Coupon replaced", body = ApiResponse<CouponModel>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CouponInput>,
) -> Result<Response, ServiceError> {
    let coupon = state.services.coupons.update_coupon(id, input).await?;
    Ok(success_response(coupon))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/coupons/{id}",
    params(("id" = Uuid, Path, description = "Coupon id")),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.coupons.delete_coupon(id).await?;
    Ok(no_content_response())
}

// Orders

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Restrict to one customer
    pub user_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(OrderListQuery),
    responses((status = 200, description = "Orders, newest first", body = ApiResponse<PaginatedResponse<OrderModel>>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Response, ServiceError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.clamp_page_size(query.per_page);
    let (orders, total) = state
        .services
        .orders
        .list_orders(page, per_page, query.user_id)
        .await?;
    Ok(success_response(PaginatedResponse::new(
        orders, page, per_page, total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderModel>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(
        state.services.orders.get_order(id, &auth_user).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/stats",
    responses((status = 200, description = "Monthly revenue and coupon usage", body = ApiResponse<OrderStats>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn order_stats(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.orders.order_stats().await?))
}

// Users

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(PaginationParams),
    responses((status = 200, description = "Users, newest first", body = ApiResponse<PaginatedResponse<UserModel>>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let page = params.page();
    let per_page = state.config.clamp_page_size(params.per_page);
    let (users, total) = state
        .services
        .users
        .list_users(page, per_page, params.search.as_deref())
        .await?;
    Ok(success_response(PaginatedResponse::new(
        users, page, per_page, total,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserModel>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<Response, ServiceError> {
    Ok(created_response(state.services.users.create_user(input).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/statistics",
    responses((status = 200, description = "Sign-ups, roles, status and top customers", body = ApiResponse<UserStatistics>)),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn user_statistics(State(state): State<AppState>) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.users.user_statistics().await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<UserModel>),
        (status = 400, description = "Invalid input or own role change", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.update_user(&auth_user, id, input).await?;
    Ok(success_response(user))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserModel>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    Ok(success_response(state.services.users.get_user(id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}/toggle-active",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User with flipped status", body = ApiResponse<UserModel>),
        (status = 400, description = "Cannot modify own account", body = crate::errors::ErrorResponse),
        (status = 403, description = "Target is an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn toggle_active(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let user = state.services.users.toggle_active(&auth_user, id).await?;
    Ok(success_response(user))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User, cart and orders deleted"),
        (status = 400, description = "Cannot delete own account", body = crate::errors::ErrorResponse),
        (status = 403, description = "Target is an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.users.delete_user(&auth_user, id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/bulk-actions",
    request_body = BulkActionRequest,
    responses(
        (status = 200, description = "Per-user outcome", body = ApiResponse<BulkActionReport>),
        (status = 400, description = "Malformed action", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "admin"
)]
pub async fn bulk_action(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<BulkActionRequest>,
) -> Result<Response, ServiceError> {
    let report = state.services.users.bulk_action(&auth_user, request).await?;
    Ok(success_response(report))
}
