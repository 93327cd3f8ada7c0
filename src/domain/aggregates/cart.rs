//! Cart Aggregate

use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};

/// One product in a cart, with the product's current pricing.
#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Money,
    pub discount: bool,
    pub discount_price: Money,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn unit_price(&self) -> &Money { if self.discount { &self.discount_price } else { &self.price } }
    pub fn line_total(&self) -> Money { self.unit_price().multiply(self.quantity.value()) }
}

#[derive(Clone, Debug)]
pub struct Cart {
    id: Uuid,
    user_id: Option<Uuid>,
    paid: bool,
    currency: String,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn restore(id: Uuid, user_id: Option<Uuid>, paid: bool, currency: &str, lines: Vec<CartLine>) -> Self {
        Self { id, user_id, paid, currency: currency.to_string(), lines }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn is_paid(&self) -> bool { self.paid }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn item_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.lines.iter().find(|l| l.product_id == product_id).map_or(0, |l| l.quantity.value())
    }

    /// Sum of unit price times quantity, recomputed on every call.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().fold(Money::zero(&self.currency), |acc, l| acc.add(&l.line_total()).unwrap_or(acc))
    }

    /// No tax or shipping is applied on top of the subtotal.
    pub fn total_price(&self) -> Money { self.subtotal() }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(price_minor: i64, discount_minor: Option<i64>, quantity: u32) -> CartLine {
        CartLine {
            id: Uuid::now_v7(), product_id: Uuid::now_v7(), name: "Widget".into(), slug: "widget".into(),
            price: Money::from_minor(price_minor, "USD"),
            discount: discount_minor.is_some(),
            discount_price: Money::from_minor(discount_minor.unwrap_or(price_minor), "USD"),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[test]
    fn test_subtotal_uses_discount_price_when_active() {
        let cart = Cart::restore(Uuid::nil(), None, false, "USD", vec![line(1000, None, 2), line(800, Some(600), 3)]);
        assert_eq!(cart.subtotal().minor_units(), 2000 + 1800);
        assert_eq!(cart.total_price(), cart.subtotal());
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_subtotal_is_order_independent() {
        let lines = vec![line(1000, None, 2), line(500, None, 1), line(999, Some(333), 7)];
        let forward = Cart::restore(Uuid::nil(), None, false, "USD", lines.clone());
        let mut reversed = lines;
        reversed.reverse();
        let backward = Cart::restore(Uuid::nil(), None, false, "USD", reversed);
        assert_eq!(forward.subtotal(), backward.subtotal());
        assert_eq!(forward.subtotal().minor_units(), 2000 + 500 + 2331);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::restore(Uuid::nil(), None, true, "USD", vec![]);
        assert!(cart.is_empty());
        assert!(cart.subtotal().amount().is_zero());
        assert_eq!(cart.quantity_of(Uuid::nil()), 0);
    }
}
