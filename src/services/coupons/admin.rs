use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::clock::Clock;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::coupon::{Coupon, CouponStatus, CouponType};
use crate::repositories::{CouponQuery, CouponRepository};
use crate::services::{PageLimits, PageRequest, Paged};

fn validate_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    if trimmed.is_empty()
        || !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::new("invalid_coupon_code"));
    }
    Ok(())
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn clean_categories(categories: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for category in categories {
        let category = category.trim();
        if !category.is_empty()
            && !cleaned
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(category))
        {
            cleaned.push(category.to_string());
        }
    }
    cleaned
}

fn dedup_ids(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Input for creating a coupon from the admin screens
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCouponInput {
    #[validate(length(min = 1, max = 64), custom = "validate_code")]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub value: Decimal,
    #[serde(default)]
    pub minimum_order_value: Option<Decimal>,
    #[serde(default)]
    pub maximum_discount_amount: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub usage_limit_per_customer: Option<u32>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_auto_apply: bool,
    #[serde(default)]
    pub auto_apply_first_purchase: bool,
    #[serde(default)]
    pub auto_apply_category: Option<String>,
    #[serde(default)]
    pub is_stackable: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub applicable_stores: Vec<Uuid>,
}

/// Partial update. Absent fields are left alone; nullable fields accept an
/// explicit `null` to clear them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCouponInput {
    #[validate(length(min = 1, max = 64), custom = "validate_code")]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub coupon_type: Option<CouponType>,
    pub value: Option<Decimal>,
    pub minimum_order_value: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub maximum_discount_amount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub usage_limit: Option<Option<u32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub usage_limit_per_customer: Option<Option<u32>>,
    pub is_active: Option<bool>,
    pub is_auto_apply: Option<bool>,
    pub auto_apply_first_purchase: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub auto_apply_category: Option<Option<String>>,
    pub is_stackable: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub applicable_categories: Option<Vec<String>>,
    pub applicable_products: Option<Vec<Uuid>>,
    pub applicable_stores: Option<Vec<Uuid>>,
}

impl UpdateCouponInput {
    fn apply_to(self, coupon: &mut Coupon) {
        if let Some(code) = self.code {
            coupon.code = Coupon::normalize_code(&code);
        }
        if let Some(name) = self.name {
            coupon.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            coupon.description = clean_text(description);
        }
        if let Some(coupon_type) = self.coupon_type {
            coupon.coupon_type = coupon_type;
        }
        if let Some(value) = self.value {
            coupon.value = value;
        }
        if let Some(minimum) = self.minimum_order_value {
            coupon.minimum_order_value = minimum;
        }
        if let Some(cap) = self.maximum_discount_amount {
            coupon.maximum_discount_amount = cap;
        }
        if let Some(limit) = self.usage_limit {
            coupon.usage_limit = limit;
        }
        if let Some(limit) = self.usage_limit_per_customer {
            coupon.usage_limit_per_customer = limit;
        }
        if let Some(flag) = self.is_active {
            coupon.is_active = flag;
        }
        if let Some(flag) = self.is_auto_apply {
            coupon.is_auto_apply = flag;
        }
        if let Some(flag) = self.auto_apply_first_purchase {
            coupon.auto_apply_first_purchase = flag;
        }
        if let Some(category) = self.auto_apply_category {
            coupon.auto_apply_category = category.map(|c| c.trim().to_string());
        }
        if let Some(flag) = self.is_stackable {
            coupon.is_stackable = flag;
        }
        if let Some(start) = self.start_date {
            coupon.start_date = start;
        }
        if let Some(end) = self.end_date {
            coupon.end_date = end;
        }
        if let Some(categories) = self.applicable_categories {
            coupon.applicable_categories = clean_categories(categories);
        }
        if let Some(products) = self.applicable_products {
            coupon.applicable_products = dedup_ids(products);
        }
        if let Some(stores) = self.applicable_stores {
            coupon.applicable_stores = dedup_ids(stores);
        }
    }
}

/// Listing criteria for the admin coupon table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponListParams {
    pub status: Option<CouponStatus>,
    pub search: Option<String>,
    pub auto_apply: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// A coupon as shown to administrators, with its read-time status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub status: CouponStatus,
    pub remaining_uses: Option<u32>,
}

impl CouponView {
    pub fn at(coupon: Coupon, now: DateTime<Utc>) -> Self {
        Self {
            status: coupon.status_at(now),
            remaining_uses: coupon.remaining_uses(),
            coupon,
        }
    }
}

fn ensure_invariants(coupon: &Coupon) -> Result<(), ServiceError> {
    let problems = coupon.invariant_violations();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(problems.join("; ")))
    }
}

/// Coupon administration: create, edit, list with derived status, toggle and delete
#[derive(Clone)]
pub struct CouponAdminService {
    coupons: Arc<dyn CouponRepository>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    page_limits: PageLimits,
}

impl CouponAdminService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        page_limits: PageLimits,
    ) -> Self {
        Self {
            coupons,
            event_sender,
            clock,
            page_limits,
        }
    }

    /// Creates a coupon with a unique normalized code.
    ///
    /// Fails with `Conflict` when the code exists and with `ValidationError`
    /// when the record would break an invariant.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CreateCouponInput) -> Result<CouponView, ServiceError> {
        input.validate()?;

        let now = self.clock.now();
        let coupon = Coupon {
            id: 0,
            code: Coupon::normalize_code(&input.code),
            name: input.name.trim().to_string(),
            description: clean_text(input.description),
            coupon_type: input.coupon_type,
            value: input.value,
            minimum_order_value: input.minimum_order_value.unwrap_or(Decimal::ZERO),
            maximum_discount_amount: input.maximum_discount_amount,
            usage_limit: input.usage_limit,
            usage_limit_per_customer: input.usage_limit_per_customer,
            used_count: 0,
            is_active: input.is_active.unwrap_or(true),
            is_auto_apply: input.is_auto_apply,
            auto_apply_first_purchase: input.auto_apply_first_purchase,
            auto_apply_category: input.auto_apply_category.map(|c| c.trim().to_string()),
            is_stackable: input.is_stackable,
            start_date: input.start_date.unwrap_or(now),
            end_date: input.end_date,
            applicable_categories: clean_categories(input.applicable_categories),
            applicable_products: dedup_ids(input.applicable_products),
            applicable_stores: dedup_ids(input.applicable_stores),
            created_at: now,
            updated_at: now,
        };
        ensure_invariants(&coupon)?;

        if self.coupons.find_by_code(&coupon.code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                coupon.code
            )));
        }

        let stored = self.coupons.insert(coupon).await?;
        info!(coupon_id = stored.id, "coupon created");
        self.event_sender
            .send_or_log(Event::CouponCreated {
                coupon_id: stored.id,
                code: stored.code.clone(),
            })
            .await;

        Ok(CouponView::at(stored, now))
    }

    pub async fn get(&self, id: i64) -> Result<CouponView, ServiceError> {
        let coupon = self.load(id).await?;
        Ok(CouponView::at(coupon, self.clock.now()))
    }

    /// Lists coupons newest first, filtered by derived status, search text and
    /// the auto-apply flag
    pub async fn list(&self, params: CouponListParams) -> Result<Paged<CouponView>, ServiceError> {
        let now = self.clock.now();
        let query = CouponQuery {
            search: params.search,
            auto_apply: params.auto_apply,
        };
        let views: Vec<CouponView> = self
            .coupons
            .list(&query)
            .await?
            .into_iter()
            .map(|coupon| CouponView::at(coupon, now))
            .filter(|view| params.status.map_or(true, |status| view.status == status))
            .collect();

        let (page, per_page) = self.page_limits.resolve(PageRequest {
            page: params.page,
            per_page: params.per_page,
        });
        Ok(Paged::from_all(views, page, per_page))
    }

    /// Applies a partial update and re-checks every invariant against the
    /// merged record. The usage counter is never touched.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCouponInput,
    ) -> Result<CouponView, ServiceError> {
        input.validate()?;

        let mut coupon = self.load(id).await?;
        let previous_code = coupon.code.clone();
        input.apply_to(&mut coupon);
        coupon.updated_at = self.clock.now();
        ensure_invariants(&coupon)?;

        if coupon.code != previous_code {
            if let Some(existing) = self.coupons.find_by_code(&coupon.code).await? {
                if existing.id != id {
                    return Err(ServiceError::Conflict(format!(
                        "Coupon code {} already exists",
                        coupon.code
                    )));
                }
            }
        }

        let stored = self.coupons.update(coupon).await?;
        self.event_sender
            .send_or_log(Event::CouponUpdated { coupon_id: id })
            .await;
        Ok(CouponView::at(stored, self.clock.now()))
    }

    pub async fn activate(&self, id: i64) -> Result<CouponView, ServiceError> {
        self.set_active(id, true).await
    }

    pub async fn deactivate(&self, id: i64) -> Result<CouponView, ServiceError> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: i64, is_active: bool) -> Result<CouponView, ServiceError> {
        self.update(
            id,
            UpdateCouponInput {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes a coupon that has never been redeemed. Coupons with redemption
    /// history must be deactivated instead.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let coupon = self.load(id).await?;

        let redemptions = self.coupons.count_redemptions(id).await?;
        if redemptions > 0 {
            return Err(ServiceError::Conflict(format!(
                "Coupon {} has {} redemptions; deactivate it instead",
                coupon.code, redemptions
            )));
        }

        if !self.coupons.delete(id).await? {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }

        info!(coupon_id = id, "coupon deleted");
        self.event_sender
            .send_or_log(Event::CouponDeleted {
                coupon_id: id,
                code: coupon.code,
            })
            .await;
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Coupon, ServiceError> {
        self.coupons
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::fixtures;
    use crate::repositories::{InMemoryCouponRepository, RedemptionRequest};
    use crate::services::coupons::test_support;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn admin(repo: &Arc<InMemoryCouponRepository>) -> CouponAdminService {
        let (sender, _rx) = EventSender::channel(16);
        CouponAdminService::new(
            repo.clone(),
            Arc::new(sender),
            test_support::clock(),
            PageLimits {
                default_per_page: 2,
                max_per_page: 5,
            },
        )
    }

    fn create_input(code: &str) -> CreateCouponInput {
        serde_json::from_value(serde_json::json!({
            "code": code,
            "name": "Summer sale",
            "coupon_type": "percentage",
            "value": "10",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_normalizes_and_defaults() {
        let repo = test_support::repo();
        let view = admin(&repo).create(create_input(" summer-10 ")).await.unwrap();
        assert_eq!(view.coupon.code, "SUMMER-10");
        assert!(view.coupon.is_active);
        assert_eq!(view.coupon.minimum_order_value, Decimal::ZERO);
        assert_eq!(view.coupon.start_date, fixtures::now());
        assert_eq!(view.status, CouponStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_code_conflicts_case_insensitively() {
        let repo = test_support::repo();
        let svc = admin(&repo);
        svc.create(create_input("SAVE10")).await.unwrap();
        assert_matches!(
            svc.create(create_input("save10")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn create_rejects_broken_invariants() {
        let repo = test_support::repo();
        let mut input = create_input("CAP");
        input.coupon_type = CouponType::FixedAmount;
        input.maximum_discount_amount = Some(dec!(5));
        assert_matches!(
            admin(&repo).create(input).await,
            Err(ServiceError::ValidationError(msg)) if msg.contains("maximum_discount_amount")
        );

        let mut input = create_input("BAD CODE!");
        input.value = dec!(5);
        assert_matches!(
            admin(&repo).create(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn update_merges_and_clears_nullable_fields() {
        let repo = test_support::repo();
        let svc = admin(&repo);
        let mut input = create_input("LIMITED");
        input.usage_limit = Some(10);
        let created = svc.create(input).await.unwrap();

        let patch: UpdateCouponInput = serde_json::from_value(serde_json::json!({
            "usage_limit": null,
            "name": "Renamed",
        }))
        .unwrap();
        let updated = svc.update(created.coupon.id, patch).await.unwrap();
        assert_eq!(updated.coupon.usage_limit, None);
        assert_eq!(updated.coupon.name, "Renamed");
        assert_eq!(updated.coupon.value, dec!(10));
    }

    #[tokio::test]
    async fn update_cannot_drop_limit_below_recorded_uses() {
        let repo = test_support::repo();
        let svc = admin(&repo);
        let mut input = create_input("USED");
        input.usage_limit = Some(10);
        let created = svc.create(input).await.unwrap();
        for _ in 0..3 {
            repo.redeem(RedemptionRequest {
                coupon_id: created.coupon.id,
                user_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                discount_amount: dec!(1),
                usage_limit_per_customer: None,
                redeemed_at: fixtures::now(),
            })
            .await
            .unwrap();
        }

        let patch = UpdateCouponInput {
            usage_limit: Some(Some(2)),
            ..Default::default()
        };
        assert_matches!(
            svc.update(created.coupon.id, patch).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            svc.delete(created.coupon.id).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn list_filters_by_derived_status_and_pages() {
        let repo = test_support::repo();
        let svc = admin(&repo);
        for code in ["A1", "A2", "A3"] {
            svc.create(create_input(code)).await.unwrap();
        }
        let mut scheduled = create_input("LATER");
        scheduled.start_date = Some(fixtures::now() + Duration::days(3));
        svc.create(scheduled).await.unwrap();
        let off = svc.create(create_input("OFF")).await.unwrap();
        svc.deactivate(off.coupon.id).await.unwrap();

        let active = svc
            .list(CouponListParams {
                status: Some(CouponStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.total, 3);
        assert_eq!(active.items.len(), 2);
        assert_eq!(active.items[0].coupon.code, "A3");

        let found = svc
            .list(CouponListParams {
                search: Some("late".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.items[0].status, CouponStatus::Scheduled);

        let inactive = svc
            .list(CouponListParams {
                status: Some(CouponStatus::Inactive),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(inactive.total, 1);
    }

    #[tokio::test]
    async fn delete_unused_coupon() {
        let repo = test_support::repo();
        let svc = admin(&repo);
        let created = svc.create(create_input("GONE")).await.unwrap();
        svc.delete(created.coupon.id).await.unwrap();
        assert_matches!(
            svc.get(created.coupon.id).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            svc.delete(created.coupon.id).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
