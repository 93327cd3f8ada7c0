//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{DiscountError, DiscountPercent, Money, Slug, SlugError};

/// Largest accepted price: ten significant digits, two of them decimals.
const MAX_PRICE_MINOR: i64 = 9_999_999_999;

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub details: String,
    pub price: Money,
    pub discount: bool,
    pub discount_value: DiscountPercent,
    /// Derived from `price`, `discount` and `discount_value` on every save.
    pub discount_price: Money,
    /// Stored for display only; totals never include it.
    pub shipping_fee: Money,
    pub is_new: bool,
    pub hot_deal: bool,
    pub sales: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Category { pub id: Uuid, pub name: String }

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ProductImage { pub id: Uuid, pub product_id: Uuid, pub path: String, pub created_at: DateTime<Utc> }

fn default_true() -> bool { true }

/// Catalog input for creating or revising a product.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProductDraft {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: bool,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub discount_value: u8,
    #[serde(default)]
    pub shipping_fee: Decimal,
    #[serde(default = "default_true")]
    pub is_new: bool,
    #[serde(default)]
    pub hot_deal: bool,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(), slug: None, description: String::new(), details: String::new(), price,
            discount: false, discount_value: 0, shipping_fee: Decimal::ZERO, is_new: true, hot_deal: false,
            categories: vec![],
        }
    }

    pub fn with_discount(mut self, percent: u8) -> Self { self.discount = true; self.discount_value = percent; self }
}

impl Product {
    pub fn create(draft: &ProductDraft, currency: &str, now: DateTime<Utc>) -> Result<Self, ProductError> {
        if draft.name.trim().is_empty() { return Err(ProductError::MissingName); }
        let slug = match draft.slug.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => Slug::parse(explicit)?,
            _ => Slug::from_name(&draft.name)?,
        };
        let zero = Money::zero(currency);
        let mut product = Self {
            id: Uuid::now_v7(), name: String::new(), slug, description: String::new(), details: String::new(),
            price: zero.clone(), discount: false, discount_value: DiscountPercent::default(), discount_price: zero.clone(),
            shipping_fee: zero, is_new: true, hot_deal: false, sales: 0, created_at: now, updated_at: now,
        };
        product.revise(draft, now)?;
        Ok(product)
    }

    /// Applies a draft in place. An absent slug keeps the current one.
    pub fn revise(&mut self, draft: &ProductDraft, now: DateTime<Utc>) -> Result<(), ProductError> {
        let name = draft.name.trim();
        if name.is_empty() { return Err(ProductError::MissingName); }
        let currency = self.price.currency().to_string();
        let price = checked_price(draft.price, &currency)?;
        let shipping_fee = checked_price(draft.shipping_fee, &currency)?;
        if let Some(explicit) = draft.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            self.slug = Slug::parse(explicit)?;
        }
        self.name = name.to_string();
        self.description = draft.description.clone();
        self.details = draft.details.clone();
        self.price = price;
        self.discount = draft.discount;
        self.discount_value = DiscountPercent::new(draft.discount_value)?;
        self.shipping_fee = shipping_fee;
        self.is_new = draft.is_new;
        self.hot_deal = draft.hot_deal;
        self.reprice();
        self.updated_at = now;
        Ok(())
    }

    pub fn reprice(&mut self) {
        self.discount_price = if self.discount { self.price.discounted(self.discount_value) } else { self.price.clone() };
    }

    /// The price a buyer pays per unit right now.
    pub fn effective_price(&self) -> &Money { if self.discount { &self.discount_price } else { &self.price } }
}

fn checked_price(amount: Decimal, currency: &str) -> Result<Money, ProductError> {
    let money = Money::new(amount, currency);
    if money.is_negative() { return Err(ProductError::NegativePrice); }
    if money.minor_units() > MAX_PRICE_MINOR { return Err(ProductError::PriceTooLarge); }
    Ok(money)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("prices cannot be negative")]
    NegativePrice,
    #[error("price exceeds the supported range")]
    PriceTooLarge,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Discount(#[from] DiscountError),
}
