use crate::ApiResponse;
use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u64,
    /// Clamped to the configured maximum
    pub per_page: Option<u64>,
    /// Case-sensitive substring filter
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}

impl PaginationParams {
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }
}

/// Standard paginated payload
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if total == 0 || per_page == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_round_up() {
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 1, 20, 0).total_pages, 0);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 1, 20, 20).total_pages, 1);
        assert_eq!(PaginatedResponse::<u8>::new(vec![], 1, 20, 21).total_pages, 2);
    }

    #[test]
    fn page_zero_is_treated_as_first_page() {
        let params = PaginationParams {
            page: 0,
            ..Default::default()
        };
        assert_eq!(params.page(), 1);
    }
}
