//! Storefront
//!
//! Self-hosted storefront service.
//!
//! ## Features
//! - Product catalog with categories, images, reviews and percentage discounts
//! - Per-user or per-session cart and wishlist
//! - Payment callback that turns a paid cart into an order
//! - Order history and status tracking
//! - Newsletter signup and customer profiles

pub mod config;
pub mod domain;
pub mod http;
pub mod publisher;
pub mod store;

use std::sync::Arc;
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::Config;
use crate::domain::aggregates::{OrderError, ProductError};
use crate::domain::value_objects::{QuantityError, RatingError};
use crate::publisher::EventPublisher;
use crate::store::Store;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub events: EventPublisher,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, events: EventPublisher, config: Config) -> Self {
        Self { store, events, config: Arc::new(config) }
    }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<ProductError> for StoreError {
    fn from(e: ProductError) -> Self { Self::InvalidInput(e.to_string()) }
}

impl From<OrderError> for StoreError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::EmptyCart => Self::EmptyCart,
            OrderError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            OrderError::UnknownStatus(_) => Self::InvalidInput(e.to_string()),
        }
    }
}

impl From<QuantityError> for StoreError {
    fn from(e: QuantityError) -> Self { Self::InvalidInput(e.to_string()) }
}

impl From<RatingError> for StoreError {
    fn from(e: RatingError) -> Self { Self::InvalidInput(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, StoreError>;
