use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::coupon::{Coupon, CouponRedemption, RedemptionOutcome};
use crate::models::notification::{Notification, NotificationFilter};

pub mod coupon_repository;
pub mod in_memory;
pub mod notification_repository;

pub use coupon_repository::SeaOrmCouponRepository;
pub use in_memory::InMemoryCouponRepository;
pub use notification_repository::InMemoryNotificationRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Storage-level criteria for admin listings. Status filtering happens in the
/// service because status depends on the clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponQuery {
    /// Case-insensitive substring over code and name
    pub search: Option<String>,
    pub auto_apply: Option<bool>,
}

impl CouponQuery {
    pub fn matches(&self, coupon: &Coupon) -> bool {
        if let Some(flag) = self.auto_apply {
            if coupon.is_auto_apply != flag {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => {
                coupon.code.to_lowercase().contains(&term)
                    || coupon.name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }

    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Everything a repository needs to consume one use of a coupon
#[derive(Debug, Clone, PartialEq)]
pub struct RedemptionRequest {
    pub coupon_id: i64,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub discount_amount: Decimal,
    pub usage_limit_per_customer: Option<u32>,
    pub redeemed_at: DateTime<Utc>,
}

impl RedemptionRequest {
    pub fn into_redemption(self) -> CouponRedemption {
        CouponRedemption {
            id: Uuid::new_v4(),
            coupon_id: self.coupon_id,
            user_id: self.user_id,
            order_id: self.order_id,
            discount_amount: self.discount_amount,
            redeemed_at: self.redeemed_at,
        }
    }
}

/// Rejection for an edit whose `usage_limit` falls below the stored counter
pub(crate) fn limit_below_uses(limit: u32, used_count: u32) -> ServiceError {
    ServiceError::ValidationError(format!(
        "usage_limit {} is below the {} uses already recorded",
        limit, used_count
    ))
}

/// Persisted coupon records.
///
/// Implementations store codes normalized and unique, assign ascending ids on
/// insert and never change `used_count` outside [`CouponRepository::redeem`] and
/// [`CouponRepository::release`].
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// `code` must already be normalized
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Coupon>, ServiceError>;

    /// Matching coupons, newest first
    async fn list(&self, query: &CouponQuery) -> Result<Vec<Coupon>, ServiceError>;

    /// Coupons flagged for automatic application, ordered by id
    async fn list_auto_apply(&self) -> Result<Vec<Coupon>, ServiceError>;

    /// Stores a new coupon. The incoming id is ignored. Fails with
    /// `Conflict` when the code is taken.
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, ServiceError>;

    /// Overwrites the editable fields of an existing coupon, keeping the stored
    /// usage counter.
    async fn update(&self, coupon: Coupon) -> Result<Coupon, ServiceError>;

    /// Returns `false` when no coupon had this id
    async fn delete(&self, id: i64) -> Result<bool, ServiceError>;

    /// Atomically checks the global and per-customer limits, increments
    /// `used_count` and records the redemption.
    async fn redeem(&self, request: RedemptionRequest) -> Result<RedemptionOutcome, ServiceError>;

    /// Removes the redemption recorded for `order_id` and gives the use back
    async fn release(&self, order_id: Uuid) -> Result<Option<CouponRedemption>, ServiceError>;

    async fn count_redemptions(&self, coupon_id: i64) -> Result<u64, ServiceError>;
}

/// How many times a customer has already used a coupon
#[async_trait]
pub trait CouponUsageLookup: Send + Sync {
    async fn usage_count(&self, coupon_id: i64, user_id: Uuid) -> Result<u32, ServiceError>;
}

/// Per-user notification storage
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<Notification, ServiceError>;

    /// Matching notifications of `user_id`, newest first
    async fn list(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, ServiceError>;

    async fn unread_count(&self, user_id: Uuid) -> Result<u64, ServiceError>;

    /// Returns the updated notification, `None` when it does not belong to `user_id`
    async fn set_read(
        &self,
        user_id: Uuid,
        id: Uuid,
        is_read: bool,
    ) -> Result<Option<Notification>, ServiceError>;

    /// Returns how many notifications changed
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, ServiceError>;

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ServiceError>;

    /// Returns how many notifications were removed
    async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError>;
}
