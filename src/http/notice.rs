//! Flash-style notices returned alongside page data.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel { Success, Info, Error }

/// One-shot user-facing message carried in a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice { pub level: NoticeLevel, pub message: String }

impl Notice {
    pub fn success(message: impl Into<String>) -> Self { Self { level: NoticeLevel::Success, message: message.into() } }
    pub fn info(message: impl Into<String>) -> Self { Self { level: NoticeLevel::Info, message: message.into() } }
    pub fn error(message: impl Into<String>) -> Self { Self { level: NoticeLevel::Error, message: message.into() } }
}

pub const CART_ITEM_ADDED: &str = "Item added to cart successfully.";
pub const CART_ITEM_REMOVED: &str = "Item removed from cart successfully.";
pub const NEWSLETTER_SUBSCRIBED: &str = "Successfully subscribed to the newsletter.";
pub const NO_ITEM_FOUND: &str = "No item found";
pub const PROFILE_UPDATED: &str = "Profile updated successfully.";
pub const LOGGED_OUT: &str = "You have been logged out.";
pub const PAYMENT_FAILED: &str = "Payment failed";
