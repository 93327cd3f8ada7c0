//! HTTP surface: storefront JSON routes plus the token-guarded admin API.

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod context;
pub mod error;
pub mod notice;
pub mod orders;
pub mod wishlist;

use axum::{http::HeaderName, middleware, routing::{get, post, put}, Json, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::AppState;

pub use context::{RequestContext, SESSION_HEADER, USER_HEADER};

pub fn router(state: AppState) -> Router {
    let session = HeaderName::from_static(SESSION_HEADER);

    let admin_routes = Router::new()
        .route("/categories", post(admin::create_category))
        .route("/products", post(admin::create_product))
        .route("/products/:slug", put(admin::update_product))
        .route("/products/:slug/images", post(admin::add_image))
        .route("/orders/:slug/status", put(admin::update_order_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::require_admin));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/", get(catalog::index))
        .route("/product/:slug/", get(catalog::product_detail).post(cart::add_to_cart))
        .route("/product/:slug/wishlist/", post(wishlist::add))
        .route("/product/:slug/reviews/", post(catalog::add_review))
        .route("/cart/", get(cart::show).post(cart::remove))
        .route("/wishlist/", get(wishlist::show).post(wishlist::remove))
        .route("/profile/", get(account::profile).post(account::update_profile))
        .route("/newsletter/", post(account::subscribe))
        .route("/api/payment/", post(orders::payment))
        .route("/order/:slug/", get(orders::detail))
        .route("/orders/", get(orders::history))
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(session.clone()))
        .layer(SetRequestIdLayer::new(session, MakeRequestUuid))
        .with_state(state)
}
