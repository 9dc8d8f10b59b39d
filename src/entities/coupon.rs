use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::coupon::{Coupon, CouponType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CouponKind {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed_amount")]
    FixedAmount,
}

impl From<CouponType> for CouponKind {
    fn from(value: CouponType) -> Self {
        match value {
            CouponType::Percentage => Self::Percentage,
            CouponType::FixedAmount => Self::FixedAmount,
        }
    }
}

impl From<CouponKind> for CouponType {
    fn from(value: CouponKind) -> Self {
        match value {
            CouponKind::Percentage => Self::Percentage,
            CouponKind::FixedAmount => Self::FixedAmount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    #[sea_orm(nullable)]
    pub description: Option<String>,
    pub coupon_type: CouponKind,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub minimum_order_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub maximum_discount_amount: Option<Decimal>,
    #[sea_orm(nullable)]
    pub usage_limit: Option<i32>,
    #[sea_orm(nullable)]
    pub usage_limit_per_customer: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub is_auto_apply: bool,
    pub auto_apply_first_purchase: bool,
    #[sea_orm(nullable)]
    pub auto_apply_category: Option<String>,
    pub is_stackable: bool,
    pub start_date: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub end_date: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Json")]
    pub applicable_categories: Json,
    #[sea_orm(column_type = "Json")]
    pub applicable_products: Json,
    #[sea_orm(column_type = "Json")]
    pub applicable_stores: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_redemption::Entity")]
    Redemptions,
}

impl Related<super::coupon_redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn to_db_count(value: u32, field: &str) -> Result<i32, ServiceError> {
    i32::try_from(value)
        .map_err(|_| ServiceError::InvalidInput(format!("{} is too large: {}", field, value)))
}

fn from_db_count(value: i32, field: &str) -> Result<u32, ServiceError> {
    u32::try_from(value).map_err(|_| {
        ServiceError::InternalError(format!("stored {} is negative: {}", field, value))
    })
}

fn list_from_json<T: serde::de::DeserializeOwned>(value: Json) -> Result<Vec<T>, ServiceError> {
    match value {
        Json::Null => Ok(Vec::new()),
        other => Ok(serde_json::from_value(other)?),
    }
}

impl TryFrom<Model> for Coupon {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: model.id,
            code: model.code,
            name: model.name,
            description: model.description,
            coupon_type: model.coupon_type.into(),
            value: model.value,
            minimum_order_value: model.minimum_order_value,
            maximum_discount_amount: model.maximum_discount_amount,
            usage_limit: model
                .usage_limit
                .map(|v| from_db_count(v, "usage_limit"))
                .transpose()?,
            usage_limit_per_customer: model
                .usage_limit_per_customer
                .map(|v| from_db_count(v, "usage_limit_per_customer"))
                .transpose()?,
            used_count: from_db_count(model.used_count, "used_count")?,
            is_active: model.is_active,
            is_auto_apply: model.is_auto_apply,
            auto_apply_first_purchase: model.auto_apply_first_purchase,
            auto_apply_category: model.auto_apply_category,
            is_stackable: model.is_stackable,
            start_date: model.start_date,
            end_date: model.end_date,
            applicable_categories: list_from_json(model.applicable_categories)?,
            applicable_products: list_from_json(model.applicable_products)?,
            applicable_stores: list_from_json(model.applicable_stores)?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Builds an active model carrying every editable column of `coupon`.
///
/// `id` and `used_count` are left unset: the id is assigned by the database and
/// the counter only moves through redemptions.
pub fn editable_columns(coupon: &Coupon) -> Result<ActiveModel, ServiceError> {
    Ok(ActiveModel {
        id: NotSet,
        code: Set(coupon.code.clone()),
        name: Set(coupon.name.clone()),
        description: Set(coupon.description.clone()),
        coupon_type: Set(coupon.coupon_type.into()),
        value: Set(coupon.value),
        minimum_order_value: Set(coupon.minimum_order_value),
        maximum_discount_amount: Set(coupon.maximum_discount_amount),
        usage_limit: Set(coupon
            .usage_limit
            .map(|v| to_db_count(v, "usage_limit"))
            .transpose()?),
        usage_limit_per_customer: Set(coupon
            .usage_limit_per_customer
            .map(|v| to_db_count(v, "usage_limit_per_customer"))
            .transpose()?),
        used_count: NotSet,
        is_active: Set(coupon.is_active),
        is_auto_apply: Set(coupon.is_auto_apply),
        auto_apply_first_purchase: Set(coupon.auto_apply_first_purchase),
        auto_apply_category: Set(coupon.auto_apply_category.clone()),
        is_stackable: Set(coupon.is_stackable),
        start_date: Set(coupon.start_date),
        end_date: Set(coupon.end_date),
        applicable_categories: Set(serde_json::to_value(&coupon.applicable_categories)?),
        applicable_products: Set(serde_json::to_value(&coupon.applicable_products)?),
        applicable_stores: Set(serde_json::to_value(&coupon.applicable_stores)?),
        created_at: Set(coupon.created_at),
        updated_at: Set(coupon.updated_at),
    })
}

/// Active model for a brand new row, including the initial usage counter
pub fn new_row(coupon: &Coupon) -> Result<ActiveModel, ServiceError> {
    let mut active = editable_columns(coupon)?;
    active.used_count = Set(to_db_count(coupon.used_count, "used_count")?);
    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::fixtures;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn model_maps_to_domain_coupon() {
        let mut coupon = fixtures::coupon("save10", CouponType::Percentage, dec!(10));
        coupon.applicable_categories = vec!["books".into()];
        coupon.applicable_stores = vec![Uuid::new_v4()];
        coupon.usage_limit = Some(5);
        coupon.used_count = 2;

        let model = Model {
            id: 7,
            code: coupon.code.clone(),
            name: coupon.name.clone(),
            description: None,
            coupon_type: CouponKind::Percentage,
            value: coupon.value,
            minimum_order_value: coupon.minimum_order_value,
            maximum_discount_amount: None,
            usage_limit: Some(5),
            usage_limit_per_customer: None,
            used_count: 2,
            is_active: true,
            is_auto_apply: false,
            auto_apply_first_purchase: false,
            auto_apply_category: None,
            is_stackable: false,
            start_date: coupon.start_date,
            end_date: None,
            applicable_categories: serde_json::json!(["books"]),
            applicable_products: Json::Null,
            applicable_stores: serde_json::to_value(&coupon.applicable_stores).unwrap(),
            created_at: coupon.created_at,
            updated_at: coupon.updated_at,
        };

        let mapped = Coupon::try_from(model).unwrap();
        coupon.id = 7;
        assert_eq!(mapped, coupon);
    }

    #[test]
    fn negative_counter_is_rejected() {
        assert!(from_db_count(-1, "used_count").is_err());
    }

    #[test]
    fn editable_columns_never_touch_the_counter() {
        let coupon = fixtures::coupon("save10", CouponType::FixedAmount, dec!(5));
        let active = editable_columns(&coupon).unwrap();
        assert!(active.used_count.is_not_set());
        assert!(active.id.is_not_set());
        assert!(new_row(&coupon).unwrap().used_count.is_set());
    }
}
