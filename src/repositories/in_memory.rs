use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::coupon::{Coupon, CouponRedemption, RedemptionOutcome};

use super::{
    limit_below_uses, CouponQuery, CouponRepository, CouponUsageLookup, RedemptionRequest,
};

/// Coupon storage held in process memory.
///
/// Redemption holds the coupon's map entry for the whole check, increment and
/// record step. Lock order is always coupon entry, then redemption entry.
#[derive(Debug)]
pub struct InMemoryCouponRepository {
    coupons: DashMap<i64, Coupon>,
    codes: DashMap<String, i64>,
    redemptions: DashMap<Uuid, CouponRedemption>,
    next_id: AtomicI64,
}

impl Default for InMemoryCouponRepository {
    fn default() -> Self {
        Self {
            coupons: DashMap::new(),
            codes: DashMap::new(),
            redemptions: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryCouponRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn conflict(code: &str) -> ServiceError {
        ServiceError::Conflict(format!("Coupon code {} already exists", code))
    }
}

#[async_trait]
impl CouponRepository for InMemoryCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError> {
        let Some(id) = self.codes.get(code).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.coupons.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Coupon>, ServiceError> {
        Ok(self.coupons.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, query: &CouponQuery) -> Result<Vec<Coupon>, ServiceError> {
        let mut coupons: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        coupons.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(coupons)
    }

    async fn list_auto_apply(&self) -> Result<Vec<Coupon>, ServiceError> {
        let mut coupons: Vec<Coupon> = self
            .coupons
            .iter()
            .filter(|entry| entry.value().is_auto_apply)
            .map(|entry| entry.value().clone())
            .collect();
        coupons.sort_by_key(|c| c.id);
        Ok(coupons)
    }

    async fn insert(&self, mut coupon: Coupon) -> Result<Coupon, ServiceError> {
        match self.codes.entry(coupon.code.clone()) {
            Entry::Occupied(_) => Err(Self::conflict(&coupon.code)),
            Entry::Vacant(slot) => {
                coupon.id = self.next_id.fetch_add(1, Ordering::SeqCst);
                self.coupons.insert(coupon.id, coupon.clone());
                slot.insert(coupon.id);
                Ok(coupon)
            }
        }
    }

    async fn update(&self, mut coupon: Coupon) -> Result<Coupon, ServiceError> {
        let id = coupon.id;
        let not_found = || ServiceError::NotFound(format!("Coupon {} not found", id));
        let previous_code = self
            .coupons
            .get(&id)
            .map(|entry| entry.value().code.clone())
            .ok_or_else(not_found)?;

        let mut reserved = None;
        if previous_code != coupon.code {
            match self.codes.entry(coupon.code.clone()) {
                Entry::Occupied(_) => return Err(Self::conflict(&coupon.code)),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                    reserved = Some(coupon.code.clone());
                }
            }
        }

        let updated = match self.coupons.get_mut(&id) {
            Some(mut entry) => {
                let stored = entry.value_mut();
                match coupon.usage_limit {
                    Some(limit) if limit < stored.used_count => {
                        Err(limit_below_uses(limit, stored.used_count))
                    }
                    _ => {
                        coupon.used_count = stored.used_count;
                        coupon.created_at = stored.created_at;
                        *stored = coupon.clone();
                        Ok(coupon)
                    }
                }
            }
            None => Err(not_found()),
        };

        match updated {
            Ok(coupon) => {
                if previous_code != coupon.code {
                    self.codes.remove(&previous_code);
                }
                Ok(coupon)
            }
            Err(err) => {
                // Give back the code reserved above
                if let Some(code) = reserved {
                    self.codes.remove(&code);
                }
                Err(err)
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        match self.coupons.remove(&id) {
            Some((_, coupon)) => {
                self.codes.remove(&coupon.code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn redeem(&self, request: RedemptionRequest) -> Result<RedemptionOutcome, ServiceError> {
        let Some(mut entry) = self.coupons.get_mut(&request.coupon_id) else {
            return Ok(RedemptionOutcome::CouponMissing);
        };
        let coupon = entry.value_mut();

        if coupon.is_exhausted() {
            return Ok(RedemptionOutcome::UsageLimitReached);
        }

        if let Some(limit) = request.usage_limit_per_customer {
            let used = self
                .redemptions
                .iter()
                .filter(|r| r.coupon_id == request.coupon_id && r.user_id == request.user_id)
                .count();
            if used >= limit as usize {
                return Ok(RedemptionOutcome::CustomerLimitReached);
            }
        }

        match self.redemptions.entry(request.order_id) {
            Entry::Occupied(_) => Ok(RedemptionOutcome::DuplicateOrder),
            Entry::Vacant(slot) => {
                let redemption = request.into_redemption();
                coupon.used_count += 1;
                slot.insert(redemption.clone());
                Ok(RedemptionOutcome::Redeemed(redemption))
            }
        }
    }

    async fn release(&self, order_id: Uuid) -> Result<Option<CouponRedemption>, ServiceError> {
        let Some((_, redemption)) = self.redemptions.remove(&order_id) else {
            return Ok(None);
        };
        if let Some(mut entry) = self.coupons.get_mut(&redemption.coupon_id) {
            let coupon = entry.value_mut();
            coupon.used_count = coupon.used_count.saturating_sub(1);
        }
        Ok(Some(redemption))
    }

    async fn count_redemptions(&self, coupon_id: i64) -> Result<u64, ServiceError> {
        Ok(self
            .redemptions
            .iter()
            .filter(|r| r.coupon_id == coupon_id)
            .count() as u64)
    }
}

#[async_trait]
impl CouponUsageLookup for InMemoryCouponRepository {
    async fn usage_count(&self, coupon_id: i64, user_id: Uuid) -> Result<u32, ServiceError> {
        let count = self
            .redemptions
            .iter()
            .filter(|r| r.coupon_id == coupon_id && r.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
