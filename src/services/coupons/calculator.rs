use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::coupon::{Coupon, CouponType};

/// Currency precision used when results leave the engine
pub const CURRENCY_SCALE: u32 = 2;

pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded discount computed for a cart total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscountBreakdown {
    pub discount_amount: Decimal,
    pub final_total: Decimal,
}

impl DiscountBreakdown {
    /// Rounds to currency precision. The final total is taken from the rounded
    /// cart and discount, so the pair always adds up to the rounded cart total.
    pub fn rounded(&self) -> (Decimal, Decimal) {
        let discount = round_currency(self.discount_amount);
        let cart_total = round_currency(self.discount_amount + self.final_total);
        (discount, (cart_total - discount).max(Decimal::ZERO))
    }
}

/// Computes the discount a coupon grants on `cart_total`.
///
/// Callers run this only after validation has passed. The result never exceeds
/// the cart total, never goes below zero and honors the coupon's cap.
pub fn calculate_discount(coupon: &Coupon, cart_total: Decimal) -> DiscountBreakdown {
    let cart_total = cart_total.max(Decimal::ZERO);

    let raw = match coupon.coupon_type {
        CouponType::Percentage => {
            let discount = cart_total * coupon.value / Decimal::ONE_HUNDRED;
            match coupon.maximum_discount_amount {
                Some(cap) => discount.min(cap),
                None => discount,
            }
        }
        CouponType::FixedAmount => coupon.value,
    };

    let discount_amount = raw.max(Decimal::ZERO).min(cart_total);
    DiscountBreakdown {
        discount_amount,
        final_total: (cart_total - discount_amount).max(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::fixtures;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(CouponType::Percentage, dec!(10), None, dec!(100), dec!(10), dec!(90))]
    #[case(CouponType::Percentage, dec!(25), Some(dec!(20)), dec!(200), dec!(20), dec!(180))]
    #[case(CouponType::Percentage, dec!(100), None, dec!(59.99), dec!(59.99), dec!(0))]
    #[case(CouponType::FixedAmount, dec!(15), None, dec!(100), dec!(15), dec!(85))]
    #[case(CouponType::FixedAmount, dec!(200), None, dec!(100), dec!(100), dec!(0))]
    #[case(CouponType::FixedAmount, dec!(5), None, dec!(0), dec!(0), dec!(0))]
    fn discount_table(
        #[case] coupon_type: CouponType,
        #[case] value: Decimal,
        #[case] cap: Option<Decimal>,
        #[case] cart_total: Decimal,
        #[case] expected_discount: Decimal,
        #[case] expected_final: Decimal,
    ) {
        let mut coupon = fixtures::coupon("CASE", coupon_type, value);
        coupon.maximum_discount_amount = cap;

        let breakdown = calculate_discount(&coupon, cart_total);
        assert_eq!(breakdown.discount_amount, expected_discount);
        assert_eq!(breakdown.final_total, expected_final);
    }

    #[test]
    fn percentage_keeps_full_precision_until_rounded() {
        let coupon = fixtures::coupon("THIRD", CouponType::Percentage, dec!(15));
        let breakdown = calculate_discount(&coupon, dec!(33.33));
        assert_eq!(breakdown.discount_amount, dec!(4.9995));
        assert_eq!(breakdown.rounded(), (dec!(5.00), dec!(28.33)));
    }

    #[test]
    fn rounded_pair_adds_up_to_the_cart() {
        let coupon = fixtures::coupon("HALF", CouponType::Percentage, dec!(50));
        let (discount, final_total) = calculate_discount(&coupon, dec!(10.01)).rounded();
        assert_eq!(discount, dec!(5.01));
        assert_eq!(final_total, dec!(5.00));
    }

    #[test]
    fn round_currency_uses_midpoint_away_from_zero() {
        assert_eq!(round_currency(dec!(2.345)), dec!(2.35));
        assert_eq!(round_currency(dec!(2.344)), dec!(2.34));
        assert_eq!(round_currency(dec!(0.005)), dec!(0.01));
    }
}
