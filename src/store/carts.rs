//! Cart resolution and cart item writes.
//!
//! Every identity owns at most one cart: users through the UNIQUE
//! `carts.user_id` column, guests through their session row.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::{Identity, Money, Quantity};
use crate::store::catalog::find_product_by_slug;
use crate::store::sessions::{claim_slot, ensure_session, find_session, SessionSlot};
use crate::store::Store;
use crate::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartItemChange { Created, Updated }

/// Outcome of an add-to-cart: the refreshed cart and what happened to the line.
#[derive(Debug, Clone)]
pub struct CartUpdate {
    pub cart: Cart,
    pub product_id: Uuid,
    pub change: CartItemChange,
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow { user_id: Option<Uuid>, paid: bool }

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    product_id: Uuid,
    name: String,
    slug: String,
    price: i64,
    discount: bool,
    discount_price: i64,
    quantity: i64,
}

impl CartLineRow {
    fn into_line(self, currency: &str) -> Result<CartLine> {
        let quantity = u32::try_from(self.quantity).map_err(|_| StoreError::InvalidInput(format!("stored quantity {} out of range", self.quantity)))?;
        Ok(CartLine {
            id: self.id,
            product_id: self.product_id,
            name: self.name,
            slug: self.slug,
            price: Money::from_minor(self.price, currency),
            discount: self.discount,
            discount_price: Money::from_minor(self.discount_price, currency),
            quantity: Quantity::new(quantity)?,
        })
    }
}

/// Looks the cart up without creating one.
pub(crate) async fn find_cart_id(conn: &mut SqliteConnection, identity: &Identity) -> Result<Option<Uuid>> {
    match identity {
        Identity::User(user_id) => {
            let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
            Ok(id)
        }
        Identity::Guest(token) => Ok(find_session(conn, token).await?.and_then(|s| s.cart_id)),
    }
}

async fn insert_cart(conn: &mut SqliteConnection, id: Uuid, user_id: Option<Uuid>) -> Result<u64> {
    let now = Utc::now();
    let inserted = sqlx::query("INSERT INTO carts (id, user_id, paid, created_at, updated_at) VALUES (?, ?, 0, ?, ?) ON CONFLICT (user_id) DO NOTHING")
        .bind(id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(inserted)
}

/// Returns the identity's cart id, creating the cart on first use.
pub(crate) async fn resolve_cart_id(conn: &mut SqliteConnection, identity: &Identity) -> Result<Uuid> {
    match identity {
        Identity::User(user_id) => {
            if insert_cart(conn, Uuid::now_v7(), Some(*user_id)).await? == 1 {
                debug!(%user_id, "created user cart");
            }
            let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM carts WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
            Ok(id)
        }
        Identity::Guest(token) => {
            if let Some(id) = ensure_session(conn, token).await?.cart_id { return Ok(id); }
            let candidate = Uuid::now_v7();
            insert_cart(conn, candidate, None).await?;
            let winner = claim_slot(conn, token, SessionSlot::Cart, candidate).await?.ok_or(StoreError::NotFound("Session"))?;
            if winner != candidate {
                sqlx::query("DELETE FROM carts WHERE id = ?").bind(candidate).execute(&mut *conn).await?;
            }
            debug!(cart_id = %winner, "resolved guest cart");
            Ok(winner)
        }
    }
}

pub(crate) async fn load_cart(conn: &mut SqliteConnection, id: Uuid, currency: &str) -> Result<Cart> {
    let row = sqlx::query_as::<_, CartRow>("SELECT user_id, paid FROM carts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound("Cart"))?;
    let lines = sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.id AS id, ci.product_id AS product_id, p.name AS name, p.slug AS slug, p.price AS price, \
         p.discount AS discount, p.discount_price AS discount_price, ci.quantity AS quantity \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = ? ORDER BY ci.created_at, ci.rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|line| line.into_line(currency))
    .collect::<Result<Vec<_>>>()?;
    Ok(Cart::restore(id, row.user_id, row.paid, currency, lines))
}

impl Store {
    /// The caller's cart, created if absent.
    #[instrument(skip(self))]
    pub async fn cart(&self, identity: &Identity) -> Result<Cart> {
        let mut tx = self.begin_write().await?;
        let id = resolve_cart_id(&mut tx, identity).await?;
        let cart = load_cart(&mut tx, id, self.currency()).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Number of lines in the caller's cart; zero when there is no cart yet.
    pub async fn cart_items_count(&self, identity: &Identity) -> Result<i64> {
        let mut conn = self.db.acquire().await?;
        let Some(cart_id) = find_cart_id(&mut conn, identity).await? else { return Ok(0) };
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Quantity of one product in the caller's cart, zero when absent.
    pub async fn cart_quantity(&self, identity: &Identity, product_id: Uuid) -> Result<u32> {
        let mut conn = self.db.acquire().await?;
        let Some(cart_id) = find_cart_id(&mut conn, identity).await? else { return Ok(0) };
        let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(quantity.and_then(|q| u32::try_from(q).ok()).unwrap_or(0))
    }

    /// Sets the quantity for `slug` in the caller's cart, creating the line on first add.
    /// A paid cart is reopened.
    #[instrument(skip(self))]
    pub async fn set_cart_item(&self, identity: &Identity, slug: &str, quantity: Quantity) -> Result<CartUpdate> {
        let mut tx = self.begin_write().await?;
        let product = find_product_by_slug(&mut tx, slug, self.currency()).await?;
        let cart_id = resolve_cart_id(&mut tx, identity).await?;
        let now = Utc::now();
        let candidate = Uuid::now_v7();
        let item_id: Uuid = sqlx::query_scalar(
            "INSERT INTO cart_items (id, cart_id, user_id, product_id, quantity, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at \
             RETURNING id",
        )
        .bind(candidate)
        .bind(cart_id)
        .bind(identity.user_id())
        .bind(product.id)
        .bind(i64::from(quantity.value()))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE carts SET paid = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        let cart = load_cart(&mut tx, cart_id, self.currency()).await?;
        tx.commit().await?;

        let change = if item_id == candidate { CartItemChange::Created } else { CartItemChange::Updated };
        info!(%cart_id, product_id = %product.id, quantity = quantity.value(), ?change, "cart item set");
        Ok(CartUpdate { cart, product_id: product.id, change })
    }

    /// Deletes a line from the caller's own cart.
    #[instrument(skip(self))]
    pub async fn remove_cart_item(&self, identity: &Identity, item_id: Uuid) -> Result<Cart> {
        let mut tx = self.begin_write().await?;
        let cart_id = find_cart_id(&mut tx, identity).await?.ok_or(StoreError::NotFound("Cart item"))?;
        let deleted = sqlx::query("DELETE FROM cart_items WHERE id = ? AND cart_id = ?")
            .bind(item_id)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 { return Err(StoreError::NotFound("Cart item")); }
        let cart = load_cart(&mut tx, cart_id, self.currency()).await?;
        tx.commit().await?;
        info!(%cart_id, %item_id, "cart item removed");
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::{file_store, guest, memory_store, remove_file_store, seed_product, user};

    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }

    #[tokio::test]
    async fn test_user_cart_is_get_or_create() {
        let store = memory_store().await;
        let alice = user();
        let first = store.cart(&alice).await.unwrap();
        let second = store.cart(&alice).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.user_id(), alice.user_id());
        assert_ne!(store.cart(&user()).await.unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn test_guest_cart_lives_in_session() {
        let store = memory_store().await;
        let visitor = guest("sess-1");
        assert_eq!(store.cart_items_count(&visitor).await.unwrap(), 0);
        let cart = store.cart(&visitor).await.unwrap();
        assert_eq!(store.cart(&visitor).await.unwrap().id(), cart.id());
        assert!(cart.user_id().is_none());
        assert_ne!(store.cart(&guest("sess-2")).await.unwrap().id(), cart.id());
    }

    #[tokio::test]
    async fn test_counters_do_not_create_carts() {
        let store = memory_store().await;
        let mug = seed_product(&store, "Mug", 900).await;
        assert_eq!(store.cart_items_count(&user()).await.unwrap(), 0);
        assert_eq!(store.cart_quantity(&guest("nobody"), mug.id).await.unwrap(), 0);
        let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts").fetch_one(store.db()).await.unwrap();
        assert_eq!(carts, 0);
    }

    #[tokio::test]
    async fn test_adding_twice_updates_quantity_in_place() {
        let store = memory_store().await;
        seed_product(&store, "Mug", 900).await;
        let visitor = guest("sess");

        let first = store.set_cart_item(&visitor, "mug", qty(1)).await.unwrap();
        assert_eq!(first.change, CartItemChange::Created);
        let second = store.set_cart_item(&visitor, "mug", qty(4)).await.unwrap();
        assert_eq!(second.change, CartItemChange::Updated);

        assert_eq!(second.cart.item_count(), 1);
        assert_eq!(second.cart.quantity_of(first.product_id), 4);
        assert_eq!(second.cart.lines()[0].id, first.cart.lines()[0].id);
        assert_eq!(second.cart.total_price().minor_units(), 3600);
        assert_eq!(store.cart_quantity(&visitor, first.product_id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let store = memory_store().await;
        let err = store.set_cart_item(&user(), "ghost", qty(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Product")));
    }

    #[tokio::test]
    async fn test_remove_only_touches_own_cart() {
        let store = memory_store().await;
        seed_product(&store, "Mug", 900).await;
        let alice = user();
        let bob = user();
        let update = store.set_cart_item(&alice, "mug", qty(2)).await.unwrap();
        let item_id = update.cart.lines()[0].id;
        store.set_cart_item(&bob, "mug", qty(1)).await.unwrap();

        assert!(matches!(store.remove_cart_item(&bob, item_id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.remove_cart_item(&user(), item_id).await, Err(StoreError::NotFound(_))));
        let cart = store.remove_cart_item(&alice, item_id).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(store.cart_items_count(&bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_adding_to_paid_cart_reopens_it() {
        let store = memory_store().await;
        seed_product(&store, "Mug", 900).await;
        let alice = user();
        let cart = store.cart(&alice).await.unwrap();
        sqlx::query("UPDATE carts SET paid = 1 WHERE id = ?").bind(cart.id()).execute(store.db()).await.unwrap();
        assert!(store.cart(&alice).await.unwrap().is_paid());

        let update = store.set_cart_item(&alice, "mug", qty(1)).await.unwrap();
        assert!(!update.cart.is_paid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_a_shared_pool() {
        let (store, path) = file_store(10).await;
        let mug = seed_product(&store, "Mug", 900).await;

        let mut tasks = Vec::new();
        for _ in 0..40 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let buyer = user();
                store.set_cart_item(&buyer, "mug", qty(1)).await?;
                store.complete_payment(&buyer, None).await.map(|_| ())
            }));
        }
        for n in 1..=10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.set_cart_item(&guest("shared"), "mug", qty(n)).await.map(|_| ()) }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(store.db()).await.unwrap();
        assert_eq!(orders, 40);
        assert_eq!(store.product_by_id(mug.id).await.unwrap().sales, 40);
        let shared = store.cart(&guest("shared")).await.unwrap();
        assert_eq!(shared.item_count(), 1);
        let guest_carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE user_id IS NULL").fetch_one(store.db()).await.unwrap();
        assert_eq!(guest_carts, 1);

        remove_file_store(store, &path).await;
    }
}
