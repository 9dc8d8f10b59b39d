use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

use super::coupon::Coupon;

/// Reasons a coupon cannot be applied to an order.
///
/// These are business outcomes carried inside a successful
/// [`ValidationResult`], not errors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    CouponNotFound,
    CouponInactive,
    CouponNotYetValid,
    CouponExpired,
    MinimumOrderValueNotMet,
    UsageLimitExceeded,
    UserLimitExceeded,
    FirstPurchaseOnly,
    StoreRestriction,
    CategoryRestriction,
    ProductRestriction,
    AlreadyApplied,
    StackingNotAllowed,
}

impl ValidationErrorCode {
    /// Message shown to the buyer in the cart
    pub fn message(&self) -> &'static str {
        match self {
            Self::CouponNotFound => "This coupon code does not exist",
            Self::CouponInactive => "This coupon is no longer active",
            Self::CouponNotYetValid => "This coupon is not valid yet",
            Self::CouponExpired => "This coupon has expired",
            Self::MinimumOrderValueNotMet => "Your order does not reach the minimum value for this coupon",
            Self::UsageLimitExceeded => "This coupon has reached its usage limit",
            Self::UserLimitExceeded => "You have already used this coupon the maximum number of times",
            Self::FirstPurchaseOnly => "This coupon is only valid on your first purchase",
            Self::StoreRestriction => "This coupon does not apply to any store in your cart",
            Self::CategoryRestriction => "This coupon does not apply to any category in your cart",
            Self::ProductRestriction => "This coupon does not apply to any product in your cart",
            Self::AlreadyApplied => "This coupon is already applied to your order",
            Self::StackingNotAllowed => "This coupon cannot be combined with other coupons",
        }
    }
}

/// Outcome of validating a coupon code against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_id: Option<i64>,
    pub errors: Vec<ValidationErrorCode>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_total: Option<Decimal>,
}

impl ValidationResult {
    pub fn not_found() -> Self {
        Self::rejected_with(None, None, vec![ValidationErrorCode::CouponNotFound])
    }

    pub fn rejected(coupon: &Coupon, errors: Vec<ValidationErrorCode>) -> Self {
        Self::rejected_with(Some(coupon.code.clone()), Some(coupon.id), errors)
    }

    fn rejected_with(
        coupon_code: Option<String>,
        coupon_id: Option<i64>,
        errors: Vec<ValidationErrorCode>,
    ) -> Self {
        let messages = errors.iter().map(|e| e.message().to_string()).collect();
        Self {
            is_valid: false,
            coupon_code,
            coupon_id,
            errors,
            messages,
            discount_amount: None,
            final_total: None,
        }
    }

    /// Amounts must already be rounded to currency precision
    pub fn accepted(coupon: &Coupon, discount_amount: Decimal, final_total: Decimal) -> Self {
        Self {
            is_valid: true,
            coupon_code: Some(coupon.code.clone()),
            coupon_id: Some(coupon.id),
            errors: Vec::new(),
            messages: Vec::new(),
            discount_amount: Some(discount_amount),
            final_total: Some(final_total),
        }
    }

    pub fn has_error(&self, code: ValidationErrorCode) -> bool {
        self.errors.contains(&code)
    }

    /// Converts an accepted result into an [`AppliedCoupon`]
    pub fn applied(&self) -> Option<AppliedCoupon> {
        if !self.is_valid {
            return None;
        }
        let discount_amount = self.discount_amount?;
        Some(AppliedCoupon {
            coupon_id: self.coupon_id?,
            code: self.coupon_code.clone()?,
            discount_amount,
            final_total: self.final_total?,
            savings: discount_amount,
        })
    }
}

/// A coupon that has been priced against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub coupon_id: i64,
    pub code: String,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub savings: Decimal,
}
