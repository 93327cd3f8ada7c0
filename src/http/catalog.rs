//! Listing, product detail and reviews.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::aggregates::{average_rating, Category, Product, ProductImage, Review, ReviewDraft};
use crate::http::context::RequestContext;
use crate::http::notice::{Notice, NO_ITEM_FOUND};
use crate::store::catalog::{ProductQuery, ProductSort, Sidebars};
use crate::store::Page;
use crate::{AppState, Result};

/// `page` stays a string so garbage clamps to the first page instead of rejecting.
#[derive(Debug, Deserialize)] pub struct ListParams { pub search: Option<String>, pub sort: Option<String>, pub page: Option<String> }
#[derive(Debug, Deserialize)] pub struct PageParams { pub page: Option<String> }

pub(crate) fn parse_page(raw: Option<&str>) -> Option<u32> { raw.and_then(|p| p.trim().parse().ok()) }

#[derive(Debug, Serialize)]
pub struct IndexView {
    pub products: Page<Product>,
    #[serde(flatten)]
    pub sidebars: Sidebars,
    pub search: Option<String>,
    pub cart_items_count: i64,
    pub wishlist_items_count: i64,
    pub messages: Vec<Notice>,
}

pub async fn index(State(s): State<AppState>, ctx: RequestContext, Query(p): Query<ListParams>) -> Result<Json<IndexView>> {
    let search = p.search.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    let query = ProductQuery { search: search.clone(), sort: ProductSort::parse(p.sort.as_deref()), page: parse_page(p.page.as_deref()) };
    let products = s.store.list_products(&query, s.config.products_per_page).await?;
    let messages = if search.is_some() && products.total == 0 { vec![Notice::info(NO_ITEM_FOUND)] } else { vec![] };
    Ok(Json(IndexView {
        products,
        sidebars: s.store.sidebars().await?,
        search,
        cart_items_count: s.store.cart_items_count(&ctx.identity).await?,
        wishlist_items_count: s.store.wishlist_items_count(&ctx.identity).await?,
        messages,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProductDetailView {
    pub product: Product,
    pub categories: Vec<Category>,
    pub images: Vec<ProductImage>,
    pub reviews: Vec<Review>,
    pub average_rating: Option<Decimal>,
    pub related_products: Page<Product>,
    /// Quantity of this product already in the caller's cart.
    pub quantity: u32,
    pub cart_items_count: i64,
    pub wishlist_items_count: i64,
}

pub async fn product_detail(State(s): State<AppState>, ctx: RequestContext, Path(slug): Path<String>, Query(p): Query<PageParams>) -> Result<Json<ProductDetailView>> {
    let product = s.store.product_by_slug(&slug).await?;
    let reviews = s.store.reviews_for(product.id).await?;
    Ok(Json(ProductDetailView {
        categories: s.store.product_categories(product.id).await?,
        images: s.store.product_images(product.id).await?,
        average_rating: average_rating(&reviews),
        reviews,
        related_products: s.store.related_products(&product, parse_page(p.page.as_deref()), s.config.related_per_page).await?,
        quantity: s.store.cart_quantity(&ctx.identity, product.id).await?,
        cart_items_count: s.store.cart_items_count(&ctx.identity).await?,
        wishlist_items_count: s.store.wishlist_items_count(&ctx.identity).await?,
        product,
    }))
}

pub async fn add_review(State(s): State<AppState>, ctx: RequestContext, Path(slug): Path<String>, Json(r): Json<ReviewDraft>) -> Result<(StatusCode, Json<Review>)> {
    let user_id = ctx.require_user()?;
    r.validate()?;
    let review = s.store.add_review(&slug, user_id, &r).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_ignores_garbage() {
        assert_eq!(parse_page(Some("3")), Some(3));
        assert_eq!(parse_page(Some("-1")), None);
        assert_eq!(parse_page(Some("abc")), None);
        assert_eq!(parse_page(None), None);
    }
}
