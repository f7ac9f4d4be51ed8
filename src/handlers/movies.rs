use super::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{errors::ServiceError, handlers::AppState, ApiResponse};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub fn movies_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movies))
        .route("/multi", post(get_movies))
        .route("/:id", get(get_movie))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MovieIdsRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/movies",
    params(PaginationParams),
    responses(
        (status = 200, description = "Catalog page", body = ApiResponse<PaginatedResponse<crate::entities::MovieModel>>),
    ),
    tag = "movies"
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
    path = "/api/v1/movies/{id}",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie", body = ApiResponse<crate::entities::MovieModel>),
        (status = 404, description = "Movie not found", body = crate::errors::ErrorResponse),
    ),
    tag = "movies"
)]
pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let movie = state.services.catalog.get_movie(id).await?;
    Ok(success_response(movie))
}

/// Fetches several movies at once; unknown ids are skipped.
#[utoipa::path(
    post,
    path = "/api/v1/movies/multi",
    request_body = MovieIdsRequest,
    responses(
        (status = 200, description = "Movies in request order", body = ApiResponse<Vec<crate::entities::MovieModel>>),
    ),
    tag = "movies"
)]
pub async fn get_movies(
    State(state): State<AppState>,
    Json(request): Json<MovieIdsRequest>,
) -> Result<Response, ServiceError> {
    request.validate()?;
    let movies = state.services.catalog.get_movies(&request.ids).await?;
    Ok(success_response(movies))
}
