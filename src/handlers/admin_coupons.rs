use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};

use super::common::{created_response, no_content_response, paged_response};
use crate::{
    errors::ServiceError,
    services::coupons::{admin::CouponView, CouponListParams, CreateCouponInput, UpdateCouponInput},
    ApiResponse, ApiResult, AppState,
};

pub async fn list_coupons(
    State(state): State<AppState>,
    Query(params): Query<CouponListParams>,
) -> Result<Response, ServiceError> {
    let page = state.services.coupon_admin.list(params).await?;
    Ok(paged_response(page))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCouponInput>,
) -> Result<Response, ServiceError> {
    let created = state.services.coupon_admin.create(payload).await?;
    Ok(created_response(created))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<CouponView> {
    let coupon = state.services.coupon_admin.get(id).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

/// Partial update: absent fields keep their value, explicit `null` clears
/// nullable fields.
pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCouponInput>,
) -> ApiResult<CouponView> {
    let updated = state.services.coupon_admin.update(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServiceError> {
    state.services.coupon_admin.delete(id).await?;
    Ok(no_content_response())
}

pub async fn activate_coupon(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<CouponView> {
    let coupon = state.services.coupon_admin.activate(id).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

pub async fn deactivate_coupon(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<CouponView> {
    let coupon = state.services.coupon_admin.deactivate(id).await?;
    Ok(Json(ApiResponse::success(coupon)))
}

/// Coupon administration routes
pub fn admin_coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/admin/coupons/:id",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .route("/admin/coupons/:id/activate", post(activate_coupon))
        .route("/admin/coupons/:id/deactivate", post(deactivate_coupon))
}
