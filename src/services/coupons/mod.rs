//! Coupon engine: rule set, discount calculator, application orchestrator and
//! auto-apply selector, plus the admin and redemption services built on them.

pub mod admin;
pub mod auto_apply;
pub mod calculator;
pub mod redemption;
pub mod validation;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};
use validator::Validate;

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::models::coupon::Coupon;
use crate::models::order_context::OrderContext;
use crate::models::validation::{AppliedCoupon, ValidationResult};
use crate::repositories::{CouponRepository, CouponUsageLookup};

pub use admin::{CouponAdminService, CouponListParams, CreateCouponInput, UpdateCouponInput};
pub use redemption::{RedeemCouponInput, RedemptionService};

/// Validates and prices `coupon` against a snapshot of the order.
///
/// Pure: the caller supplies the clock reading and the customer's prior usage.
pub fn evaluate_coupon(
    coupon: &Coupon,
    context: &OrderContext,
    now: DateTime<Utc>,
    customer_usage: u32,
) -> ValidationResult {
    let errors = validation::validate_coupon(&validation::RuleInput {
        coupon,
        context,
        now,
        customer_usage,
    });
    if !errors.is_empty() {
        return ValidationResult::rejected(coupon, errors);
    }

    let (discount_amount, final_total) =
        calculator::calculate_discount(coupon, context.cart_total).rounded();
    ValidationResult::accepted(coupon, discount_amount, final_total)
}

/// Read-only coupon evaluation for carts. Nothing here changes counters.
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
    usage: Arc<dyn CouponUsageLookup>,
    clock: Arc<dyn Clock>,
}

impl CouponService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        usage: Arc<dyn CouponUsageLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coupons,
            usage,
            clock,
        }
    }

    /// Validates `code` against the order and, when every rule passes, prices it.
    ///
    /// An unknown code is a normal, invalid result carrying only
    /// `COUPON_NOT_FOUND`. A blank code or a malformed context is an error.
    #[instrument(skip(self, context), fields(user_id = %context.user_id))]
    pub async fn apply_coupon(
        &self,
        code: &str,
        context: &OrderContext,
    ) -> Result<ValidationResult, ServiceError> {
        let normalized = Coupon::normalize_code(code);
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "coupon code must not be empty".to_string(),
            ));
        }
        context.validate()?;

        let result = match self.coupons.find_by_code(&normalized).await? {
            Some(coupon) => self.evaluate(&coupon, context).await?,
            None => ValidationResult::not_found(),
        };

        record_outcome(&result);
        debug!(
            code = %normalized,
            is_valid = result.is_valid,
            errors = ?result.errors,
            "coupon evaluated"
        );
        Ok(result)
    }

    /// Evaluates an already loaded coupon at the current time
    pub async fn evaluate(
        &self,
        coupon: &Coupon,
        context: &OrderContext,
    ) -> Result<ValidationResult, ServiceError> {
        let customer_usage = if coupon.usage_limit_per_customer.is_some() {
            self.usage.usage_count(coupon.id, context.user_id).await?
        } else {
            0
        };
        Ok(evaluate_coupon(
            coupon,
            context,
            self.clock.now(),
            customer_usage,
        ))
    }

    /// The auto-apply coupon giving the greatest savings on this order, if any
    #[instrument(skip(self, context), fields(user_id = %context.user_id))]
    pub async fn best_auto_apply(
        &self,
        context: &OrderContext,
    ) -> Result<Option<AppliedCoupon>, ServiceError> {
        context.validate()?;

        let mut priced = Vec::new();
        for coupon in self.coupons.list_auto_apply().await? {
            if !auto_apply::is_candidate(&coupon, context) {
                continue;
            }
            if let Some(applied) = self.evaluate(&coupon, context).await?.applied() {
                priced.push(applied);
            }
        }

        let best = auto_apply::select_best(priced);
        if let Some(applied) = &best {
            debug!(coupon_id = applied.coupon_id, savings = %applied.savings, "auto-apply coupon selected");
        }
        Ok(best)
    }
}

fn record_outcome(result: &ValidationResult) {
    if result.is_valid {
        metrics::counter!("coupon_applications_total", 1, "outcome" => "accepted");
    } else {
        metrics::counter!("coupon_applications_total", 1, "outcome" => "rejected");
        for code in &result.errors {
            metrics::counter!("coupon_rejections_total", 1, "reason" => code.as_ref().to_string());
        }
    }
}
