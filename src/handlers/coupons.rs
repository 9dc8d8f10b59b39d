use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{created_response, map_service_error, validate_input};
use crate::{
    errors::ApiError,
    models::{AppliedCoupon, CouponRedemption, OrderContext, ValidationResult},
    services::coupons::RedeemCouponInput,
    ApiResponse, ApiResult, AppState,
};

/// Body of `POST /coupons/apply`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code is required"))]
    pub code: String,
    #[validate]
    pub context: OrderContext,
}

/// Validates and prices a coupon code against a cart.
///
/// Rule failures come back as a normal `200` body with `is_valid = false`.
pub async fn apply_coupon(
    State(state): State<AppState>,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<Json<ApiResponse<ValidationResult>>, ApiError> {
    validate_input(&payload)?;
    let result = state
        .services
        .coupons
        .apply_coupon(&payload.code, &payload.context)
        .await
        .map_err(map_service_error)?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn auto_apply_coupon(
    State(state): State<AppState>,
    Json(context): Json<OrderContext>,
) -> ApiResult<Option<AppliedCoupon>> {
    let best = state.services.coupons.best_auto_apply(&context).await?;
    Ok(Json(ApiResponse::success(best)))
}

pub async fn redeem_coupon(
    State(state): State<AppState>,
    Json(payload): Json<RedeemCouponInput>,
) -> Result<Response, ApiError> {
    validate_input(&payload)?;
    let applied = state
        .services
        .redemptions
        .redeem(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(applied))
}

pub async fn release_redemption(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<CouponRedemption> {
    let released = state.services.redemptions.release(order_id).await?;
    Ok(Json(ApiResponse::success(released)))
}

/// Checkout-facing coupon routes
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons/apply", post(apply_coupon))
        .route("/coupons/auto-apply", post(auto_apply_coupon))
        .route("/coupons/redeem", post(redeem_coupon))
        .route(
            "/coupons/redemptions/:order_id/release",
            post(release_redemption),
        )
}
