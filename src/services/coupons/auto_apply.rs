use crate::models::coupon::Coupon;
use crate::models::order_context::OrderContext;
use crate::models::validation::AppliedCoupon;

/// Whether an auto-apply coupon should be tried for this cart at all
pub fn is_candidate(coupon: &Coupon, context: &OrderContext) -> bool {
    if !coupon.is_auto_apply {
        return false;
    }
    match coupon.auto_apply_category.as_deref() {
        Some(category) => context.has_category(category),
        None => true,
    }
}

/// Picks the priced coupon with the greatest discount. Ties go to the lower id.
pub fn select_best<I>(priced: I) -> Option<AppliedCoupon>
where
    I: IntoIterator<Item = AppliedCoupon>,
{
    priced.into_iter().fold(None, |best, candidate| match best {
        Some(current)
            if current.discount_amount > candidate.discount_amount
                || (current.discount_amount == candidate.discount_amount
                    && current.coupon_id <= candidate.coupon_id) =>
        {
            Some(current)
        }
        _ => Some(candidate),
    })
}
