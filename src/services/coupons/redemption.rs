use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::coupon::{Coupon, CouponRedemption, RedemptionOutcome};
use crate::models::order_context::OrderContext;
use crate::models::validation::{AppliedCoupon, ValidationErrorCode};
use crate::repositories::{CouponRepository, RedemptionRequest};

use super::CouponService;

/// Order confirmation request consuming one use of a coupon
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedeemCouponInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub user_id: Uuid,
    pub order_id: Uuid,
    #[validate]
    pub context: OrderContext,
}

/// Consumes and gives back coupon uses at order confirmation and cancellation
#[derive(Clone)]
pub struct RedemptionService {
    engine: CouponService,
    coupons: Arc<dyn CouponRepository>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
}

impl RedemptionService {
    pub fn new(
        engine: CouponService,
        coupons: Arc<dyn CouponRepository>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            coupons,
            event_sender,
            clock,
        }
    }

    /// Re-validates and re-prices the coupon against the confirmed order, then
    /// atomically consumes one use and records the redemption.
    ///
    /// The coupon's own code may already be listed among the applied codes of
    /// the order; it is ignored there.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn redeem(&self, input: RedeemCouponInput) -> Result<AppliedCoupon, ServiceError> {
        input.validate()?;
        if input.user_id != input.context.user_id {
            return Err(ServiceError::InvalidInput(
                "user_id does not match the order context".to_string(),
            ));
        }

        let code = Coupon::normalize_code(&input.code);
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "coupon code must not be empty".to_string(),
            ));
        }
        let coupon = self
            .coupons
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;

        let context = input.context.without_applied(&code);
        let result = self.engine.evaluate(&coupon, &context).await?;
        let Some(applied) = result.applied() else {
            return Err(rejection_error(&coupon.code, &result.errors));
        };

        let outcome = self
            .coupons
            .redeem(RedemptionRequest {
                coupon_id: coupon.id,
                user_id: input.user_id,
                order_id: input.order_id,
                discount_amount: applied.discount_amount,
                usage_limit_per_customer: coupon.usage_limit_per_customer,
                redeemed_at: self.clock.now(),
            })
            .await?;

        match outcome {
            RedemptionOutcome::Redeemed(redemption) => {
                metrics::counter!("coupon_redemptions_total", 1, "outcome" => "redeemed");
                info!(coupon_id = coupon.id, discount = %applied.discount_amount, "coupon redeemed");
                self.event_sender
                    .send_or_log(Event::CouponRedeemed {
                        coupon_id: coupon.id,
                        code: coupon.code.clone(),
                        user_id: redemption.user_id,
                        order_id: redemption.order_id,
                        discount_amount: redemption.discount_amount,
                        redeemed_at: redemption.redeemed_at,
                    })
                    .await;
                Ok(applied)
            }
            RedemptionOutcome::CouponMissing => {
                Err(ServiceError::NotFound(format!("Coupon {} not found", code)))
            }
            RedemptionOutcome::UsageLimitReached => {
                metrics::counter!("coupon_redemptions_total", 1, "outcome" => "usage_limit");
                warn!(coupon_id = coupon.id, "coupon exhausted by a concurrent order");
                Err(ServiceError::Conflict(format!(
                    "Coupon {} has reached its usage limit",
                    code
                )))
            }
            RedemptionOutcome::CustomerLimitReached => {
                metrics::counter!("coupon_redemptions_total", 1, "outcome" => "customer_limit");
                Err(ServiceError::Conflict(format!(
                    "Coupon {} has reached its per-customer limit",
                    code
                )))
            }
            RedemptionOutcome::DuplicateOrder => {
                metrics::counter!("coupon_redemptions_total", 1, "outcome" => "duplicate_order");
                Err(ServiceError::Conflict(format!(
                    "Order {} already redeemed a coupon",
                    input.order_id
                )))
            }
        }
    }

    /// Gives the coupon use of a cancelled order back
    #[instrument(skip(self))]
    pub async fn release(&self, order_id: Uuid) -> Result<CouponRedemption, ServiceError> {
        let redemption = self.coupons.release(order_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("No redemption recorded for order {}", order_id))
        })?;

        metrics::counter!("coupon_redemptions_released_total", 1);
        info!(coupon_id = redemption.coupon_id, "coupon redemption released");
        self.event_sender
            .send_or_log(Event::CouponRedemptionReleased {
                coupon_id: redemption.coupon_id,
                order_id,
            })
            .await;
        Ok(redemption)
    }
}

fn rejection_error(code: &str, errors: &[ValidationErrorCode]) -> ServiceError {
    let reasons = errors
        .iter()
        .map(|e| e.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    let limit_hit = errors.iter().any(|e| {
        matches!(
            e,
            ValidationErrorCode::UsageLimitExceeded | ValidationErrorCode::UserLimitExceeded
        )
    });
    let message = format!("Coupon {} cannot be redeemed: {}", code, reasons);
    if limit_hit {
        ServiceError::Conflict(message)
    } else {
        ServiceError::InvalidOperation(message)
    }
}
