use super::common::{created_response, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::AppState,
    services::users::{AuthSession, LoginInput, RegisterInput},
    ApiResponse,
};
use axum::{
    extract::{Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Public account routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes describing the authenticated caller
pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(current_user))
        .route("/check-email", get(check_email))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthSession>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Response, ServiceError> {
    let session = state.services.users.register(input).await?;
    Ok(created_response(session))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<AuthSession>),
        (status = 401, description = "Wrong password", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account deactivated", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown email", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Response, ServiceError> {
    let session = state.services.users.login(input).await?;
    Ok(success_response(session))
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "The caller's account", body = ApiResponse<crate::entities::UserModel>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Response, ServiceError> {
    let user = state.services.users.get_user(auth_user.user_id).await?;
    Ok(success_response(user))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailAvailability {
    pub email: String,
    pub available: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/me/check-email",
    params(EmailQuery),
    responses(
        (status = 200, description = "Whether the email is free", body = ApiResponse<EmailAvailability>),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn check_email(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<EmailQuery>,
) -> Result<Response, ServiceError> {
    let available = state.services.users.email_available(&query.email).await?;
    Ok(success_response(EmailAvailability {
        email: query.email,
        available,
    }))
}
