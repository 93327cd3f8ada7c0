//! Catalog and order administration, behind `x-admin-token`.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::aggregates::{Category, Order, OrderStatus, Product, ProductDraft, ProductImage};
use crate::domain::events::DomainEvent;
use crate::{AppState, Result, StoreError};

pub const ADMIN_HEADER: &str = "x-admin-token";

/// Rejects every request while no admin token is configured.
pub async fn require_admin(State(s): State<AppState>, req: Request, next: Next) -> Result<Response> {
    let presented = req.headers().get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    match (s.config.admin_token.as_deref(), presented) {
        (Some(expected), Some(given)) if expected == given => Ok(next.run(req).await),
        _ => Err(StoreError::Forbidden),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImageForm {
    #[validate(length(min = 1, max = 255))]
    pub path: String,
}

#[derive(Debug, Deserialize)] pub struct StatusForm { pub status: String }
#[derive(Debug, Serialize)] pub struct StatusChange { pub order: Order, pub previous: OrderStatus }

pub async fn create_category(State(s): State<AppState>, Json(r): Json<CategoryForm>) -> Result<(StatusCode, Json<Category>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.store.create_category(&r.name).await?)))
}

pub async fn create_product(State(s): State<AppState>, Json(r): Json<ProductDraft>) -> Result<(StatusCode, Json<Product>)> {
    r.validate()?;
    let product = s.store.create_product(&r).await?;
    s.events.publish(DomainEvent::ProductCreated { product_id: product.id, slug: product.slug.to_string() }).await;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(State(s): State<AppState>, Path(slug): Path<String>, Json(r): Json<ProductDraft>) -> Result<Json<Product>> {
    r.validate()?;
    Ok(Json(s.store.update_product(&slug, &r).await?))
}

pub async fn add_image(State(s): State<AppState>, Path(slug): Path<String>, Json(r): Json<ImageForm>) -> Result<(StatusCode, Json<ProductImage>)> {
    r.validate()?;
    Ok((StatusCode::CREATED, Json(s.store.add_product_image(&slug, &r.path).await?)))
}

pub async fn update_order_status(State(s): State<AppState>, Path(slug): Path<String>, Json(r): Json<StatusForm>) -> Result<Json<StatusChange>> {
    let next: OrderStatus = r.status.trim().parse()?;
    let (order, previous) = s.store.update_order_status(&slug, next).await?;
    s.events.publish(DomainEvent::OrderStatusChanged { order_id: order.id(), slug: order.slug().to_string(), from: previous, to: next }).await;
    Ok(Json(StatusChange { order, previous }))
}
