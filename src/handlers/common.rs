use crate::errors::{ApiError, ServiceError};
use crate::services::Paged;
use crate::{ApiResponse, PaginatedResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// `201 Created` with the standard envelope
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// One page of a listing inside the standard envelope
pub fn paged_response<T: Serialize>(page: Paged<T>) -> Response {
    Json(ApiResponse::success(PaginatedResponse::from(page))).into_response()
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Runs the `validator` rules of a request body
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input.validate().map_err(|e| ApiError::ValidationError {
        message: "Validation failed".to_string(),
        details: Some(e.to_string()),
    })
}

pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}
