//! Wishlist pages.

use axum::{extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Wishlist, WishlistChange, WishlistEntry};
use crate::http::context::RequestContext;
use crate::http::notice::Notice;
use crate::{AppState, Result};

#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub id: Uuid,
    pub items: Vec<WishlistEntry>,
    pub wishlist_items_count: usize,
    pub cart_items_count: i64,
    pub messages: Vec<Notice>,
}

impl WishlistView {
    fn new(wishlist: Wishlist, cart_items_count: i64, messages: Vec<Notice>) -> Self {
        Self { id: wishlist.id(), wishlist_items_count: wishlist.len(), items: wishlist.items().to_vec(), cart_items_count, messages }
    }
}

fn notice(change: WishlistChange) -> Notice {
    match change {
        WishlistChange::Added | WishlistChange::Removed => Notice::success(change.message()),
        WishlistChange::AlreadyPresent => Notice::info(change.message()),
        WishlistChange::NotPresent => Notice::error(change.message()),
    }
}

/// `item_id` is the product id.
#[derive(Debug, Deserialize)] pub struct RemoveForm { pub item_id: Uuid }

pub async fn show(State(s): State<AppState>, ctx: RequestContext) -> Result<Json<WishlistView>> {
    let wishlist = s.store.wishlist(&ctx.identity).await?;
    Ok(Json(WishlistView::new(wishlist, s.store.cart_items_count(&ctx.identity).await?, vec![])))
}

pub async fn add(State(s): State<AppState>, ctx: RequestContext, Path(slug): Path<String>) -> Result<Json<WishlistView>> {
    let (wishlist, change) = s.store.add_to_wishlist(&ctx.identity, &slug).await?;
    Ok(Json(WishlistView::new(wishlist, s.store.cart_items_count(&ctx.identity).await?, vec![notice(change)])))
}

pub async fn remove(State(s): State<AppState>, ctx: RequestContext, Json(f): Json<RemoveForm>) -> Result<Json<WishlistView>> {
    let (wishlist, change) = s.store.remove_from_wishlist(&ctx.identity, f.item_id).await?;
    Ok(Json(WishlistView::new(wishlist, s.store.cart_items_count(&ctx.identity).await?, vec![notice(change)])))
}
