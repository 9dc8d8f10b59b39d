//! SeaORM entities. Conversions to the domain types in [`crate::models`] live
//! next to each entity.

pub mod coupon;
pub mod coupon_redemption;
