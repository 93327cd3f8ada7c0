//! Payment callback and order history.

use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::aggregates::Order;
use crate::domain::events::DomainEvent;
use crate::http::catalog::{parse_page, PageParams};
use crate::http::context::RequestContext;
use crate::http::notice::PAYMENT_FAILED;
use crate::store::Page;
use crate::{AppState, Result};

const ORDERS_PER_PAGE: u32 = 10;
const PAYMENT_SUCCESS: &str = "success";

/// Gateway notification. Only `status == "success"` completes the cart.
#[derive(Debug, Deserialize)] pub struct PaymentNotice { pub status: String, pub reference: Option<String> }

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success { order: Order },
    Error { message: String },
}

pub async fn payment(State(s): State<AppState>, ctx: RequestContext, Json(n): Json<PaymentNotice>) -> Result<Json<PaymentOutcome>> {
    if n.status.trim() != PAYMENT_SUCCESS {
        warn!(status = %n.status, reference = ?n.reference, "payment not successful");
        return Ok(Json(PaymentOutcome::Error { message: PAYMENT_FAILED.to_string() }));
    }
    let reference = n.reference.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let order = s.store.complete_payment(&ctx.identity, reference).await?;
    s.events.publish(DomainEvent::order_placed(&order)).await;
    Ok(Json(PaymentOutcome::Success { order }))
}

pub async fn detail(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<Order>> {
    Ok(Json(s.store.order_by_slug(&slug).await?))
}

pub async fn history(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<PageParams>) -> Result<Json<Page<Order>>> {
    let user_id = ctx.require_user()?;
    Ok(Json(s.store.orders_for_user(user_id, parse_page(p.page.as_deref()), ORDERS_PER_PAGE).await?))
}
