//! Payment completion and order history.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus};
use crate::domain::value_objects::{Identity, Money};
use crate::store::carts::{find_cart_id, load_cart};
use crate::store::{Page, PageWindow, Store};
use crate::{Result, StoreError};

const ORDER_COLUMNS: &str = "id, slug, user_id, cart_id, status, total_price, payment_reference, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    slug: String,
    user_id: Option<Uuid>,
    cart_id: Option<Uuid>,
    status: String,
    total_price: i64,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow { id: Uuid, product_id: Option<Uuid>, product_name: String, quantity: i64, unit_price: i64 }

async fn load_items(conn: &mut SqliteConnection, order_id: Uuid, currency: &str) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, product_id, product_name, quantity, unit_price FROM order_items WHERE order_id = ? ORDER BY rowid",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter()
        .map(|r| {
            let quantity = u32::try_from(r.quantity).map_err(|_| StoreError::InvalidInput(format!("stored quantity {} out of range", r.quantity)))?;
            Ok(OrderItem { id: r.id, product_id: r.product_id, product_name: r.product_name, quantity, unit_price: Money::from_minor(r.unit_price, currency) })
        })
        .collect()
}

async fn hydrate(conn: &mut SqliteConnection, row: OrderRow, currency: &str) -> Result<Order> {
    let items = load_items(conn, row.id, currency).await?;
    Ok(Order {
        id: row.id,
        slug: row.slug,
        user_id: row.user_id,
        cart_id: row.cart_id,
        status: row.status.parse()?,
        total_price: Money::from_minor(row.total_price, currency),
        payment_reference: row.payment_reference,
        items,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn find_order(conn: &mut SqliteConnection, slug: &str, currency: &str) -> Result<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE slug = ?"))
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound("Order"))?;
    hydrate(conn, row, currency).await
}

impl Store {
    /// Turns the caller's cart into a pending order in one transaction: the
    /// order and its items are written, sales counters bumped, the cart
    /// emptied and marked paid. Nothing changes if any step fails.
    #[instrument(skip(self))]
    pub async fn complete_payment(&self, identity: &Identity, reference: Option<String>) -> Result<Order> {
        let mut tx = self.begin_write().await?;
        let cart_id = find_cart_id(&mut tx, identity).await?.ok_or(StoreError::NotFound("Cart"))?;
        let cart = load_cart(&mut tx, cart_id, self.currency()).await?;
        let order = Order::place(&cart, reference, Utc::now())?;

        sqlx::query(
            "INSERT INTO orders (id, slug, user_id, cart_id, total_price, status, payment_reference, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id)
        .bind(&order.slug)
        .bind(order.user_id)
        .bind(order.cart_id)
        .bind(order.total_price.minor_units())
        .bind(order.status.as_str())
        .bind(&order.payment_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(item.id)
                .bind(order.id)
                .bind(item.product_id)
                .bind(&item.product_name)
                .bind(i64::from(item.quantity))
                .bind(item.unit_price.minor_units())
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE products SET sales = sales + ? WHERE id = ?")
                .bind(i64::from(item.quantity))
                .bind(item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?").bind(cart_id).execute(&mut *tx).await?;
        sqlx::query("UPDATE carts SET paid = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(order_id = %order.id, slug = %order.slug, total = %order.total_price, items = order.items.len(), "order placed");
        Ok(order)
    }

    pub async fn order_by_slug(&self, slug: &str) -> Result<Order> {
        let mut conn = self.db.acquire().await?;
        find_order(&mut conn, slug, self.currency()).await
    }

    /// The user's orders, newest first.
    pub async fn orders_for_user(&self, user_id: Uuid, page: Option<u32>, per_page: u32) -> Result<Page<Order>> {
        let mut conn = self.db.acquire().await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        let window = PageWindow::new(page, per_page, total);
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(window.limit())
        .bind(window.offset())
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(hydrate(&mut conn, row, self.currency()).await?);
        }
        Ok(window.wrap(orders, total))
    }

    /// Moves an order along the status machine. Returns the order and its previous status.
    #[instrument(skip(self))]
    pub async fn update_order_status(&self, slug: &str, next: OrderStatus) -> Result<(Order, OrderStatus)> {
        let mut tx = self.begin_write().await?;
        let mut order = find_order(&mut tx, slug, self.currency()).await?;
        let previous = order.transition(next, Utc::now())?;
        sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .bind(order.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(order_id = %order.id, from = %previous, to = %next, "order status changed");
        Ok((order, previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Quantity;
    use crate::store::test_utils::{guest, memory_store, seed_product, user};

    #[tokio::test]
    async fn test_payment_success_freezes_cart_into_order() {
        let store = memory_store().await;
        let a = seed_product(&store, "Alpha", 1000).await;
        let b = seed_product(&store, "Beta", 500).await;
        let buyer = user();
        store.set_cart_item(&buyer, "alpha", Quantity::new(2).unwrap()).await.unwrap();
        store.set_cart_item(&buyer, "beta", Quantity::new(1).unwrap()).await.unwrap();

        let order = store.complete_payment(&buyer, Some("gw-42".into())).await.unwrap();
        assert_eq!(order.total_price().minor_units(), 2500);
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_reference(), Some("gw-42"));

        let cart = store.cart(&buyer).await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.is_paid());
        assert_eq!(store.product_by_id(a.id).await.unwrap().sales, 2);
        assert_eq!(store.product_by_id(b.id).await.unwrap().sales, 1);

        let stored = store.order_by_slug(order.slug()).await.unwrap();
        assert_eq!(stored.total_price().minor_units(), 2500);
        let alpha = stored.items().iter().find(|i| i.product_id == Some(a.id)).unwrap();
        assert_eq!((alpha.quantity, alpha.unit_price.minor_units()), (2, 1000));
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(store.db()).await.unwrap();
        assert_eq!(orders, 1);
    }

    #[tokio::test]
    async fn test_frozen_prices_survive_catalog_changes() {
        let store = memory_store().await;
        seed_product(&store, "Alpha", 1000).await;
        let buyer = guest("pay-1");
        store.set_cart_item(&buyer, "alpha", Quantity::default()).await.unwrap();
        let order = store.complete_payment(&buyer, None).await.unwrap();

        let mut draft = crate::domain::aggregates::ProductDraft::new("Alpha", rust_decimal::Decimal::new(9999, 2));
        draft.slug = Some("alpha".into());
        store.update_product("alpha", &draft).await.unwrap();
        let stored = store.order_by_slug(order.slug()).await.unwrap();
        assert_eq!(stored.items()[0].unit_price.minor_units(), 1000);
        assert!(stored.user_id().is_none());
    }

    #[tokio::test]
    async fn test_empty_or_missing_cart_changes_nothing() {
        let store = memory_store().await;
        let buyer = user();
        assert!(matches!(store.complete_payment(&buyer, None).await, Err(StoreError::NotFound("Cart"))));
        store.cart(&buyer).await.unwrap();
        assert!(matches!(store.complete_payment(&buyer, None).await, Err(StoreError::EmptyCart)));
        assert!(!store.cart(&buyer).await.unwrap().is_paid());
        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(store.db()).await.unwrap();
        assert_eq!(orders, 0);
    }

    #[tokio::test]
    async fn test_history_and_status_updates() {
        let store = memory_store().await;
        seed_product(&store, "Alpha", 1000).await;
        let buyer = user();
        let user_id = buyer.user_id().unwrap();
        let mut slugs = vec![];
        for _ in 0..3 {
            store.set_cart_item(&buyer, "alpha", Quantity::default()).await.unwrap();
            slugs.push(store.complete_payment(&buyer, None).await.unwrap().slug().to_string());
        }
        let page = store.orders_for_user(user_id, Some(1), 2).await.unwrap();
        assert_eq!((page.total, page.num_pages, page.data.len()), (3, 2, 2));
        assert_eq!(page.data[0].slug(), slugs[2]);
        assert!(store.orders_for_user(Uuid::now_v7(), None, 2).await.unwrap().data.is_empty());

        let (order, previous) = store.update_order_status(&slugs[0], OrderStatus::Processing).await.unwrap();
        assert_eq!((previous, order.status()), (OrderStatus::Pending, OrderStatus::Processing));
        let err = store.update_order_status(&slugs[0], OrderStatus::Delivered).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.order_by_slug(&slugs[0]).await.unwrap().status(), OrderStatus::Processing);
        assert!(matches!(store.order_by_slug("ord-missing").await, Err(StoreError::NotFound("Order"))));
    }
}
