//! Domain types shared by services, repositories and handlers

pub mod coupon;
pub mod notification;
pub mod order_context;
pub mod validation;

pub use coupon::{Coupon, CouponRedemption, CouponStatus, CouponType, RedemptionOutcome};
pub use notification::{Notification, NotificationFilter, NotificationKind};
pub use order_context::{LineItem, OrderContext};
pub use validation::{AppliedCoupon, ValidationErrorCode, ValidationResult};
