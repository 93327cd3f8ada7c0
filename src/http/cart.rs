//! Cart page and add-to-cart.

use axum::{extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Money, Quantity};
use crate::http::context::RequestContext;
use crate::http::notice::{Notice, CART_ITEM_ADDED, CART_ITEM_REMOVED, NEWSLETTER_SUBSCRIBED};
use crate::{AppState, Result};

#[derive(Debug, Serialize)]
pub struct CartLineView { #[serde(flatten)] pub line: CartLine, pub unit_price: Money, pub line_total: Money }

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub paid: bool,
    pub items: Vec<CartLineView>,
    pub cart_items_count: usize,
    pub wishlist_items_count: i64,
    pub subtotal: Money,
    pub total_price: Money,
    pub messages: Vec<Notice>,
}

impl CartView {
    pub fn new(cart: &Cart, wishlist_items_count: i64, messages: Vec<Notice>) -> Self {
        let items = cart.lines().iter().map(|l| CartLineView { unit_price: l.unit_price().clone(), line_total: l.line_total(), line: l.clone() }).collect();
        Self {
            id: cart.id(), paid: cart.is_paid(), items, cart_items_count: cart.item_count(), wishlist_items_count,
            subtotal: cart.subtotal(), total_price: cart.total_price(), messages,
        }
    }
}

#[derive(Debug, Default, Deserialize)] pub struct AddToCartForm { pub quantity: Option<u32>, pub email: Option<String> }
#[derive(Debug, Deserialize)] pub struct RemoveItemForm { pub item_id: Uuid }

pub async fn show(State(s): State<AppState>, ctx: RequestContext) -> Result<Json<CartView>> {
    let cart = s.store.cart(&ctx.identity).await?;
    let wishlist_items_count = s.store.wishlist_items_count(&ctx.identity).await?;
    Ok(Json(CartView::new(&cart, wishlist_items_count, vec![])))
}

/// Sets the product's quantity in the caller's cart. A valid `email` also
/// subscribes the caller to the newsletter; an invalid one is ignored.
pub async fn add_to_cart(State(s): State<AppState>, ctx: RequestContext, Path(slug): Path<String>, Json(f): Json<AddToCartForm>) -> Result<Json<CartView>> {
    let quantity = f.quantity.map(Quantity::new).transpose()?.unwrap_or_default();
    let update = s.store.set_cart_item(&ctx.identity, &slug, quantity).await?;
    s.events.publish(DomainEvent::CartItemSet { cart_id: update.cart.id(), product_id: update.product_id, quantity: quantity.value() }).await;

    let mut messages = vec![Notice::success(CART_ITEM_ADDED)];
    if let Some(email) = f.email.as_deref().map(str::trim).filter(|e| validator::validate_email(*e)) {
        if s.store.subscribe_newsletter(email).await? {
            s.events.publish(DomainEvent::NewsletterSubscribed { email: email.to_lowercase() }).await;
        }
        messages.push(Notice::success(NEWSLETTER_SUBSCRIBED));
    } else if f.email.is_some() {
        debug!("ignoring invalid newsletter email on add-to-cart");
    }

    let wishlist_items_count = s.store.wishlist_items_count(&ctx.identity).await?;
    Ok(Json(CartView::new(&update.cart, wishlist_items_count, messages)))
}

pub async fn remove(State(s): State<AppState>, ctx: RequestContext, Json(f): Json<RemoveItemForm>) -> Result<Json<CartView>> {
    let cart = s.store.remove_cart_item(&ctx.identity, f.item_id).await?;
    let wishlist_items_count = s.store.wishlist_items_count(&ctx.identity).await?;
    Ok(Json(CartView::new(&cart, wishlist_items_count, vec![Notice::success(CART_ITEM_REMOVED)])))
}
