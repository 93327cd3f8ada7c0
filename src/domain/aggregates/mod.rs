//! Aggregates module
pub mod product;
pub mod review;
pub mod cart;
pub mod wishlist;
pub mod order;
pub mod profile;

pub use product::{Category, Product, ProductDraft, ProductError, ProductImage};
pub use review::{average_rating, Review, ReviewDraft};
pub use cart::{Cart, CartLine};
pub use wishlist::{Wishlist, WishlistChange, WishlistEntry};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use profile::{NotificationPrefs, Profile, ProfileUpdate};
