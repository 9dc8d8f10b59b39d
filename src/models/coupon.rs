use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// How a coupon's `value` is interpreted
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CouponType {
    /// `value` is a percentage of the cart total (0 < value <= 100)
    Percentage,
    /// `value` is a currency amount taken off the cart total
    FixedAmount,
}

/// Status derived from a coupon's flags, window and counters at read time.
/// It is never persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CouponStatus {
    Active,
    Inactive,
    Scheduled,
    Expired,
    Exhausted,
}

/// A discount rule identified by a code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    /// Normalized code (trimmed, upper-case)
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub value: Decimal,
    pub minimum_order_value: Decimal,
    /// Cap on the computed discount, percentage coupons only
    pub maximum_discount_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub usage_limit_per_customer: Option<u32>,
    pub used_count: u32,
    pub is_active: bool,
    pub is_auto_apply: bool,
    pub auto_apply_first_purchase: bool,
    pub auto_apply_category: Option<String>,
    pub is_stackable: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub applicable_categories: Vec<String>,
    pub applicable_products: Vec<Uuid>,
    pub applicable_stores: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Canonical form used for storage and lookups
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(false, |end| now > end)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .map_or(false, |limit| self.used_count >= limit)
    }

    /// Remaining global uses, `None` when unlimited
    pub fn remaining_uses(&self) -> Option<u32> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.used_count))
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> CouponStatus {
        if !self.is_active {
            CouponStatus::Inactive
        } else if !self.has_started(now) {
            CouponStatus::Scheduled
        } else if self.has_expired(now) {
            CouponStatus::Expired
        } else if self.is_exhausted() {
            CouponStatus::Exhausted
        } else {
            CouponStatus::Active
        }
    }

    /// Checks the record-level invariants enforced on create and update.
    /// Returns every broken invariant, not just the first.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.code.is_empty() {
            problems.push("code must not be empty".to_string());
        }
        if self.value <= Decimal::ZERO {
            problems.push("value must be greater than zero".to_string());
        }
        if self.coupon_type == CouponType::Percentage && self.value > Decimal::ONE_HUNDRED {
            problems.push("percentage value must not exceed 100".to_string());
        }
        if self.minimum_order_value < Decimal::ZERO {
            problems.push("minimum_order_value must not be negative".to_string());
        }
        if let Some(cap) = self.maximum_discount_amount {
            if self.coupon_type != CouponType::Percentage {
                problems.push(
                    "maximum_discount_amount is only allowed on percentage coupons".to_string(),
                );
            }
            if cap <= Decimal::ZERO {
                problems.push("maximum_discount_amount must be greater than zero".to_string());
            }
        }
        if let Some(limit) = self.usage_limit {
            if limit == 0 {
                problems.push("usage_limit must be at least 1".to_string());
            } else if self.used_count > limit {
                problems.push(format!(
                    "usage_limit {} is below the {} uses already recorded",
                    limit, self.used_count
                ));
            }
        }
        if self.usage_limit_per_customer == Some(0) {
            problems.push("usage_limit_per_customer must be at least 1".to_string());
        }
        if let Some(end) = self.end_date {
            if end <= self.start_date {
                problems.push("end_date must be after start_date".to_string());
            }
        }
        if matches!(&self.auto_apply_category, Some(c) if c.trim().is_empty()) {
            problems.push("auto_apply_category must not be blank".to_string());
        }

        problems
    }
}

/// A consumed use of a coupon, recorded at order confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponRedemption {
    pub id: Uuid,
    pub coupon_id: i64,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub discount_amount: Decimal,
    pub redeemed_at: DateTime<Utc>,
}

/// Result of an atomic redemption attempt against a repository
#[derive(Debug, Clone, PartialEq)]
pub enum RedemptionOutcome {
    Redeemed(CouponRedemption),
    CouponMissing,
    UsageLimitReached,
    CustomerLimitReached,
    DuplicateOrder,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{coupon, now};
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn normalize_code_trims_and_uppercases() {
        assert_eq!(Coupon::normalize_code("  save10 "), "SAVE10");
        assert_eq!(Coupon::normalize_code("Summer-2024"), "SUMMER-2024");
    }

    #[test]
    fn status_is_derived_with_precedence() {
        let mut c = coupon("SAVE10", CouponType::Percentage, dec!(10));
        assert_eq!(c.status_at(now()), CouponStatus::Active);

        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(c.status_at(now()), CouponStatus::Exhausted);

        c.end_date = Some(now() - Duration::days(1));
        assert_eq!(c.status_at(now()), CouponStatus::Expired);

        c.start_date = now() + Duration::days(1);
        c.end_date = Some(now() + Duration::days(2));
        assert_eq!(c.status_at(now()), CouponStatus::Scheduled);

        c.is_active = false;
        assert_eq!(c.status_at(now()), CouponStatus::Inactive);
    }

    #[test]
    fn end_date_is_inclusive() {
        let mut c = coupon("EDGE", CouponType::FixedAmount, dec!(5));
        c.end_date = Some(now());
        assert!(!c.has_expired(now()));
        assert!(c.has_expired(now() + Duration::seconds(1)));
    }

    #[test]
    fn invariants_report_every_problem() {
        let mut c = coupon("BAD", CouponType::FixedAmount, dec!(0));
        c.maximum_discount_amount = Some(dec!(5));
        c.usage_limit = Some(2);
        c.used_count = 3;
        c.end_date = Some(c.start_date);

        let problems = c.invariant_violations();
        assert_eq!(problems.len(), 4, "{:?}", problems);
    }

    #[test]
    fn percentage_over_one_hundred_is_rejected() {
        let c = coupon("HUGE", CouponType::Percentage, dec!(100.01));
        assert_eq!(
            c.invariant_violations(),
            vec!["percentage value must not exceed 100".to_string()]
        );
        assert!(coupon("FULL", CouponType::Percentage, dec!(100))
            .invariant_violations()
            .is_empty());
    }

    #[test]
    fn remaining_uses_saturates() {
        let mut c = coupon("LIMITED", CouponType::FixedAmount, dec!(5));
        assert_eq!(c.remaining_uses(), None);
        c.usage_limit = Some(5);
        c.used_count = 2;
        assert_eq!(c.remaining_uses(), Some(3));
    }

    #[test]
    fn coupon_type_round_trips_through_strings() {
        assert_eq!(CouponType::FixedAmount.to_string(), "fixed_amount");
        assert_eq!(
            "percentage".parse::<CouponType>().unwrap(),
            CouponType::Percentage
        );
        assert_eq!(
            serde_json::to_value(CouponStatus::Exhausted).unwrap(),
            serde_json::json!("exhausted")
        );
    }
}
