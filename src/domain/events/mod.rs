//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{Order, OrderStatus};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ProductCreated { product_id: Uuid, slug: String },
    CartItemSet { cart_id: Uuid, product_id: Uuid, quantity: u32 },
    OrderPlaced { order_id: Uuid, slug: String, user_id: Option<Uuid>, total: Decimal, items: usize },
    OrderStatusChanged { order_id: Uuid, slug: String, from: OrderStatus, to: OrderStatus },
    NewsletterSubscribed { email: String },
}

impl DomainEvent {
    pub fn order_placed(order: &Order) -> Self {
        Self::OrderPlaced {
            order_id: order.id(), slug: order.slug().to_string(), user_id: order.user_id(),
            total: order.total_price().amount(), items: order.items().len(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProductCreated { .. } => "product_created",
            Self::CartItemSet { .. } => "cart_item_set",
            Self::OrderPlaced { .. } => "order_placed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::NewsletterSubscribed { .. } => "newsletter_subscribed",
        }
    }

    pub fn subject(&self) -> String { format!("storefront.{}", self.name()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = DomainEvent::CartItemSet { cart_id: Uuid::nil(), product_id: Uuid::nil(), quantity: 2 };
        assert_eq!(event.subject(), "storefront.cart_item_set");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cart_item_set");
        assert_eq!(json["quantity"], 2);
    }
}
