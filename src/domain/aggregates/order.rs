//! Order Aggregate
//!
//! An order is a snapshot of a cart taken when payment succeeds. Items keep the
//! product name and unit price they had at that moment; only the status moves
//! afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Canceled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Canceled) | (Processing, Shipped) | (Processing, Canceled) | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Canceled) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    /// Cleared if the product is later deleted from the catalog.
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) slug: String,
    pub(crate) user_id: Option<Uuid>,
    pub(crate) cart_id: Option<Uuid>,
    pub(crate) status: OrderStatus,
    pub(crate) total_price: Money,
    pub(crate) payment_reference: Option<String>,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Order {
    /// Freezes the cart's current contents into a pending order.
    pub fn place(cart: &Cart, payment_reference: Option<String>, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        let id = Uuid::now_v7();
        let items = cart.lines().iter().map(|line| OrderItem {
            id: Uuid::now_v7(),
            product_id: Some(line.product_id),
            product_name: line.name.clone(),
            quantity: line.quantity.value(),
            unit_price: line.unit_price().clone(),
        }).collect();
        Ok(Self {
            id, slug: format!("ord-{}", id.simple()), user_id: cart.user_id(), cart_id: Some(cart.id()),
            status: OrderStatus::Pending, total_price: cart.subtotal(), payment_reference, items,
            created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn slug(&self) -> &str { &self.slug }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn cart_id(&self) -> Option<Uuid> { self.cart_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn total_price(&self) -> &Money { &self.total_price }
    pub fn payment_reference(&self) -> Option<&str> { self.payment_reference.as_deref() }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Moves the order along the status machine, returning the previous status.
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<OrderStatus, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let previous = std::mem::replace(&mut self.status, next);
        self.updated_at = now;
        Ok(previous)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("unknown order status '{0}'")]
    UnknownStatus(String),
}
