pub mod admin_coupons;
pub mod common;
pub mod coupons;
pub mod health;
pub mod notifications;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::repositories::{
    CouponRepository, CouponUsageLookup, InMemoryCouponRepository, InMemoryNotificationRepository,
    NotificationRepository, SeaOrmCouponRepository,
};
use crate::services::coupons::{CouponAdminService, CouponService, RedemptionService};
use crate::services::notifications::NotificationService;
use crate::services::PageLimits;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Storage backing the services
#[derive(Clone)]
pub struct Repositories {
    pub coupons: Arc<dyn CouponRepository>,
    pub usage: Arc<dyn CouponUsageLookup>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repositories {
    /// Coupons and redemptions in the database, notifications in memory
    pub fn sea_orm(db: Arc<DbPool>) -> Self {
        let coupons = Arc::new(SeaOrmCouponRepository::new(db));
        Self {
            coupons: coupons.clone(),
            usage: coupons,
            notifications: Arc::new(InMemoryNotificationRepository::new()),
        }
    }

    pub fn in_memory() -> Self {
        let coupons = Arc::new(InMemoryCouponRepository::new());
        Self {
            coupons: coupons.clone(),
            usage: coupons,
            notifications: Arc::new(InMemoryNotificationRepository::new()),
        }
    }
}

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub coupon_admin: Arc<CouponAdminService>,
    pub redemptions: Arc<RedemptionService>,
    pub notifications: Arc<NotificationService>,
    pub page_limits: PageLimits,
}

impl AppServices {
    pub fn new(
        repositories: &Repositories,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        page_limits: PageLimits,
    ) -> Self {
        let engine = CouponService::new(
            repositories.coupons.clone(),
            repositories.usage.clone(),
            clock.clone(),
        );
        let coupon_admin = CouponAdminService::new(
            repositories.coupons.clone(),
            event_sender.clone(),
            clock.clone(),
            page_limits,
        );
        let redemptions = RedemptionService::new(
            engine.clone(),
            repositories.coupons.clone(),
            event_sender.clone(),
            clock.clone(),
        );
        let notifications =
            NotificationService::new(repositories.notifications.clone(), Some(event_sender))
                .with_clock(clock);

        Self {
            coupons: Arc::new(engine),
            coupon_admin: Arc::new(coupon_admin),
            redemptions: Arc::new(redemptions),
            notifications: Arc::new(notifications),
            page_limits,
        }
    }

    /// Builds the services with the limits configured in `config`
    pub fn from_config(
        config: &AppConfig,
        repositories: &Repositories,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(repositories, event_sender, clock, config.page_limits())
    }
}
