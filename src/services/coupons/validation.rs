//! Ordered coupon rules. Each rule inspects one constraint and every violated
//! rule is reported, so the cart can show all problems at once.

use chrono::{DateTime, Utc};

use crate::models::coupon::Coupon;
use crate::models::order_context::OrderContext;
use crate::models::validation::ValidationErrorCode;

/// Inputs shared by every rule
pub struct RuleInput<'a> {
    pub coupon: &'a Coupon,
    pub context: &'a OrderContext,
    pub now: DateTime<Utc>,
    /// Times this customer has already redeemed the coupon
    pub customer_usage: u32,
}

type Rule = fn(&RuleInput<'_>) -> Option<ValidationErrorCode>;

const RULES: &[Rule] = &[
    check_active,
    check_started,
    check_not_expired,
    check_minimum_order_value,
    check_usage_limit,
    check_customer_limit,
    check_first_purchase,
    check_store_restriction,
    check_category_restriction,
    check_product_restriction,
    check_already_applied,
    check_stacking,
];

/// Runs every rule in order and collects the violations
pub fn validate_coupon(input: &RuleInput<'_>) -> Vec<ValidationErrorCode> {
    RULES.iter().filter_map(|rule| rule(input)).collect()
}

fn check_active(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    (!input.coupon.is_active).then_some(ValidationErrorCode::CouponInactive)
}

fn check_started(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    (!input.coupon.has_started(input.now)).then_some(ValidationErrorCode::CouponNotYetValid)
}

fn check_not_expired(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    input
        .coupon
        .has_expired(input.now)
        .then_some(ValidationErrorCode::CouponExpired)
}

fn check_minimum_order_value(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    (input.context.cart_total < input.coupon.minimum_order_value)
        .then_some(ValidationErrorCode::MinimumOrderValueNotMet)
}

fn check_usage_limit(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    input
        .coupon
        .is_exhausted()
        .then_some(ValidationErrorCode::UsageLimitExceeded)
}

fn check_customer_limit(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    let limit = input.coupon.usage_limit_per_customer?;
    (input.customer_usage >= limit).then_some(ValidationErrorCode::UserLimitExceeded)
}

fn check_first_purchase(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    (input.coupon.auto_apply_first_purchase && !input.context.is_first_purchase)
        .then_some(ValidationErrorCode::FirstPurchaseOnly)
}

fn check_store_restriction(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    let stores = &input.coupon.applicable_stores;
    if stores.is_empty() {
        return None;
    }
    let matched = input
        .context
        .items
        .iter()
        .filter_map(|item| item.store_id)
        .any(|store| stores.contains(&store));
    (!matched).then_some(ValidationErrorCode::StoreRestriction)
}

fn check_category_restriction(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    let categories = &input.coupon.applicable_categories;
    if categories.is_empty() {
        return None;
    }
    let matched = categories
        .iter()
        .any(|category| input.context.has_category(category));
    (!matched).then_some(ValidationErrorCode::CategoryRestriction)
}

fn check_product_restriction(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    let products = &input.coupon.applicable_products;
    if products.is_empty() {
        return None;
    }
    let matched = input
        .context
        .items
        .iter()
        .any(|item| products.contains(&item.product_id));
    (!matched).then_some(ValidationErrorCode::ProductRestriction)
}

fn check_already_applied(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    input
        .context
        .has_applied(&input.coupon.code)
        .then_some(ValidationErrorCode::AlreadyApplied)
}

fn check_stacking(input: &RuleInput<'_>) -> Option<ValidationErrorCode> {
    if input.coupon.is_stackable {
        return None;
    }
    let others = input
        .context
        .other_applied_codes(&input.coupon.code)
        .next()
        .is_some();
    others.then_some(ValidationErrorCode::StackingNotAllowed)
}
