use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::coupon::{self as coupon_entity, Column, Entity as CouponEntity};
use crate::entities::coupon_redemption::{
    self as redemption_entity, Column as RedemptionColumn, Entity as RedemptionEntity,
};
use crate::errors::ServiceError;
use crate::models::coupon::{Coupon, CouponRedemption, RedemptionOutcome};

use super::{
    limit_below_uses, BaseRepository, CouponQuery, CouponRepository, CouponUsageLookup, RedemptionRequest,
    Repository,
};

fn map_write_error(err: DbErr, code: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(format!("Coupon code {} already exists", code))
        }
        _ => ServiceError::DatabaseError(err),
    }
}

/// Coupon storage backed by SeaORM
#[derive(Debug, Clone)]
pub struct SeaOrmCouponRepository {
    base: BaseRepository,
}

impl SeaOrmCouponRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn to_domain(models: Vec<coupon_entity::Model>) -> Result<Vec<Coupon>, ServiceError> {
        models.into_iter().map(Coupon::try_from).collect()
    }
}

impl Repository for SeaOrmCouponRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

#[async_trait]
impl CouponRepository for SeaOrmCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, ServiceError> {
        CouponEntity::find()
            .filter(Column::Code.eq(code))
            .one(self.get_db())
            .await?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Coupon>, ServiceError> {
        CouponEntity::find_by_id(id)
            .one(self.get_db())
            .await?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn list(&self, query: &CouponQuery) -> Result<Vec<Coupon>, ServiceError> {
        let mut select = CouponEntity::find();
        if let Some(flag) = query.auto_apply {
            select = select.filter(Column::IsAutoApply.eq(flag));
        }
        let models = select.order_by_desc(Column::Id).all(self.get_db()).await?;

        // Substring search runs here so it is case-insensitive on every backend
        Ok(Self::to_domain(models)?
            .into_iter()
            .filter(|coupon| query.matches(coupon))
            .collect())
    }

    async fn list_auto_apply(&self) -> Result<Vec<Coupon>, ServiceError> {
        let models = CouponEntity::find()
            .filter(Column::IsAutoApply.eq(true))
            .order_by_asc(Column::Id)
            .all(self.get_db())
            .await?;
        Self::to_domain(models)
    }

    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, ServiceError> {
        let model = coupon_entity::new_row(&coupon)?
            .insert(self.get_db())
            .await
            .map_err(|e| map_write_error(e, &coupon.code))?;
        debug!(coupon_id = model.id, "coupon row inserted");
        Coupon::try_from(model)
    }

    #[instrument(skip(self, coupon), fields(coupon_id = coupon.id))]
    async fn update(&self, coupon: Coupon) -> Result<Coupon, ServiceError> {
        let mut active = coupon_entity::editable_columns(&coupon)?;
        active.created_at = ActiveValue::NotSet;

        // The new limit is checked against the counter in the same statement,
        // so a redemption committed after the caller loaded the coupon still counts.
        let mut statement = CouponEntity::update_many()
            .set(active)
            .filter(Column::Id.eq(coupon.id));
        if let Some(limit) = coupon.usage_limit {
            statement = statement.filter(Column::UsedCount.lte(i64::from(limit)));
        }

        let txn = self.get_db().begin().await?;
        let result = match statement.exec(&txn).await {
            Ok(result) => result,
            Err(e) => {
                txn.rollback().await?;
                return Err(map_write_error(e, &coupon.code));
            }
        };

        let current = CouponEntity::find_by_id(coupon.id).one(&txn).await?;
        txn.commit().await?;

        match current {
            None => Err(ServiceError::NotFound(format!(
                "Coupon {} not found",
                coupon.id
            ))),
            Some(model) if result.rows_affected == 0 => match coupon.usage_limit {
                Some(limit) => Err(limit_below_uses(
                    limit,
                    u32::try_from(model.used_count).unwrap_or(u32::MAX),
                )),
                None => Coupon::try_from(model),
            },
            Some(model) => Coupon::try_from(model),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let result = CouponEntity::delete_by_id(id).exec(self.get_db()).await?;
        Ok(result.rows_affected > 0)
    }

    #[instrument(skip(self, request), fields(coupon_id = request.coupon_id, order_id = %request.order_id))]
    async fn redeem(&self, request: RedemptionRequest) -> Result<RedemptionOutcome, ServiceError> {
        let txn = self.get_db().begin().await?;

        // The conditional increment takes the row lock first so concurrent
        // redemptions of the same coupon serialize on it.
        let updated = CouponEntity::update_many()
            .col_expr(Column::UsedCount, Expr::col(Column::UsedCount).add(1))
            .filter(Column::Id.eq(request.coupon_id))
            .filter(
                Condition::any()
                    .add(Column::UsageLimit.is_null())
                    .add(Expr::col(Column::UsageLimit).gt(Expr::col(Column::UsedCount))),
            )
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            let exists = CouponEntity::find_by_id(request.coupon_id)
                .one(&txn)
                .await?
                .is_some();
            txn.rollback().await?;
            return Ok(if exists {
                RedemptionOutcome::UsageLimitReached
            } else {
                RedemptionOutcome::CouponMissing
            });
        }

        if let Some(limit) = request.usage_limit_per_customer {
            let used = RedemptionEntity::find()
                .filter(RedemptionColumn::CouponId.eq(request.coupon_id))
                .filter(RedemptionColumn::UserId.eq(request.user_id))
                .count(&txn)
                .await?;
            if used >= u64::from(limit) {
                txn.rollback().await?;
                return Ok(RedemptionOutcome::CustomerLimitReached);
            }
        }

        let duplicate = RedemptionEntity::find()
            .filter(RedemptionColumn::OrderId.eq(request.order_id))
            .one(&txn)
            .await?
            .is_some();
        if duplicate {
            txn.rollback().await?;
            return Ok(RedemptionOutcome::DuplicateOrder);
        }

        let redemption = request.into_redemption();
        let row = redemption_entity::ActiveModel {
            id: ActiveValue::Set(redemption.id),
            coupon_id: ActiveValue::Set(redemption.coupon_id),
            user_id: ActiveValue::Set(redemption.user_id),
            order_id: ActiveValue::Set(redemption.order_id),
            discount_amount: ActiveValue::Set(redemption.discount_amount),
            redeemed_at: ActiveValue::Set(redemption.redeemed_at),
        };
        if let Err(e) = RedemptionEntity::insert(row).exec(&txn).await {
            txn.rollback().await?;
            // A concurrent redemption of the same order on another coupon won
            return match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Ok(RedemptionOutcome::DuplicateOrder)
                }
                _ => Err(e.into()),
            };
        }
        txn.commit().await?;

        Ok(RedemptionOutcome::Redeemed(redemption))
    }

    #[instrument(skip(self))]
    async fn release(&self, order_id: Uuid) -> Result<Option<CouponRedemption>, ServiceError> {
        let txn = self.get_db().begin().await?;

        let Some(model) = RedemptionEntity::find()
            .filter(RedemptionColumn::OrderId.eq(order_id))
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        RedemptionEntity::delete_by_id(model.id).exec(&txn).await?;
        CouponEntity::update_many()
            .col_expr(Column::UsedCount, Expr::col(Column::UsedCount).sub(1))
            .filter(Column::Id.eq(model.coupon_id))
            .filter(Column::UsedCount.gt(0))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        Ok(Some(model.into()))
    }

    async fn count_redemptions(&self, coupon_id: i64) -> Result<u64, ServiceError> {
        Ok(RedemptionEntity::find()
            .filter(RedemptionColumn::CouponId.eq(coupon_id))
            .count(self.get_db())
            .await?)
    }
}

#[async_trait]
impl CouponUsageLookup for SeaOrmCouponRepository {
    async fn usage_count(&self, coupon_id: i64, user_id: Uuid) -> Result<u32, ServiceError> {
        let count = RedemptionEntity::find()
            .filter(RedemptionColumn::CouponId.eq(coupon_id))
            .filter(RedemptionColumn::UserId.eq(user_id))
            .count(self.get_db())
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
