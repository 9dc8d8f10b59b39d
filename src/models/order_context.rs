use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::coupon::Coupon;

fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

/// A single cart line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineItem {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(custom = "validate_non_negative")]
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub store_id: Option<Uuid>,
}

/// Snapshot of the cart a coupon is evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderContext {
    #[validate(custom = "validate_non_negative")]
    pub cart_total: Decimal,
    #[serde(default)]
    #[validate]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub is_first_purchase: bool,
    pub user_id: Uuid,
    #[serde(default)]
    pub applied_coupon_codes: Vec<String>,
}

impl OrderContext {
    pub fn new(user_id: Uuid, cart_total: Decimal) -> Self {
        Self {
            cart_total,
            items: Vec::new(),
            is_first_purchase: false,
            user_id,
            applied_coupon_codes: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_applied_code(mut self, code: impl Into<String>) -> Self {
        self.applied_coupon_codes.push(code.into());
        self
    }

    pub fn first_purchase(mut self, value: bool) -> Self {
        self.is_first_purchase = value;
        self
    }

    pub fn has_applied(&self, normalized_code: &str) -> bool {
        self.applied_coupon_codes
            .iter()
            .any(|code| Coupon::normalize_code(code) == normalized_code)
    }

    /// Applied codes other than `normalized_code`
    pub fn other_applied_codes<'a>(
        &'a self,
        normalized_code: &'a str,
    ) -> impl Iterator<Item = &'a String> + 'a {
        self.applied_coupon_codes
            .iter()
            .filter(move |code| Coupon::normalize_code(code) != normalized_code)
    }

    pub fn has_category(&self, category: &str) -> bool {
        let wanted = category.trim();
        self.items.iter().any(|item| {
            item.category
                .as_deref()
                .map_or(false, |c| c.trim().eq_ignore_ascii_case(wanted))
        })
    }

    /// Copy of this context with `normalized_code` removed from the applied codes
    pub fn without_applied(&self, normalized_code: &str) -> Self {
        let mut ctx = self.clone();
        ctx.applied_coupon_codes
            .retain(|code| Coupon::normalize_code(code) != normalized_code);
        ctx
    }
}

impl LineItem {
    pub fn new(product_id: Uuid, quantity: u32, price: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            price,
            category: None,
            store_id: None,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn from_store(mut self, store_id: Uuid) -> Self {
        self.store_id = Some(store_id);
        self
    }
}
