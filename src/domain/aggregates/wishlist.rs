//! Wishlist Aggregate

use serde::Serialize;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub price: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct Wishlist {
    id: Uuid,
    user_id: Option<Uuid>,
    items: Vec<WishlistEntry>,
}

impl Wishlist {
    pub fn restore(id: Uuid, user_id: Option<Uuid>, items: Vec<WishlistEntry>) -> Self { Self { id, user_id, items } }
    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Option<Uuid> { self.user_id }
    pub fn items(&self) -> &[WishlistEntry] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn contains(&self, product_id: Uuid) -> bool { self.items.iter().any(|i| i.product_id == product_id) }
}

/// Result of toggling a product on a wishlist. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WishlistChange { Added, AlreadyPresent, Removed, NotPresent }

impl WishlistChange {
    pub fn message(self) -> &'static str {
        match self {
            Self::Added => "Item added to wishlist.",
            Self::AlreadyPresent => "Item is already in the wishlist.",
            Self::Removed => "Item removed from wishlist successfully.",
            Self::NotPresent => "Item is not in the wishlist.",
        }
    }

    pub fn is_noop(self) -> bool { matches!(self, Self::AlreadyPresent | Self::NotPresent) }
}
