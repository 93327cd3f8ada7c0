//! Wishlist resolution and toggling.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Wishlist, WishlistChange, WishlistEntry};
use crate::domain::value_objects::{Identity, Money};
use crate::store::catalog::find_product_by_slug;
use crate::store::sessions::{claim_slot, ensure_session, find_session, SessionSlot};
use crate::store::Store;
use crate::{Result, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct EntryRow { id: Uuid, product_id: Uuid, name: String, slug: String, price: i64, discount: bool, discount_price: i64 }

impl EntryRow {
    fn into_entry(self, currency: &str) -> WishlistEntry {
        let price = if self.discount { self.discount_price } else { self.price };
        WishlistEntry { id: self.id, product_id: self.product_id, name: self.name, slug: self.slug, price: Money::from_minor(price, currency) }
    }
}

pub(crate) async fn find_wishlist_id(conn: &mut SqliteConnection, identity: &Identity) -> Result<Option<Uuid>> {
    match identity {
        Identity::User(user_id) => {
            let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM wishlists WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;
            Ok(id)
        }
        Identity::Guest(token) => Ok(find_session(conn, token).await?.and_then(|s| s.wishlist_id)),
    }
}

async fn insert_wishlist(conn: &mut SqliteConnection, id: Uuid, user_id: Option<Uuid>) -> Result<()> {
    sqlx::query("INSERT INTO wishlists (id, user_id, created_at) VALUES (?, ?, ?) ON CONFLICT (user_id) DO NOTHING")
        .bind(id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn resolve_wishlist_id(conn: &mut SqliteConnection, identity: &Identity) -> Result<Uuid> {
    match identity {
        Identity::User(user_id) => {
            insert_wishlist(conn, Uuid::now_v7(), Some(*user_id)).await?;
            let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM wishlists WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *conn)
                .await?;
            Ok(id)
        }
        Identity::Guest(token) => {
            if let Some(id) = ensure_session(conn, token).await?.wishlist_id { return Ok(id); }
            let candidate = Uuid::now_v7();
            insert_wishlist(conn, candidate, None).await?;
            let winner = claim_slot(conn, token, SessionSlot::Wishlist, candidate).await?.ok_or(StoreError::NotFound("Session"))?;
            if winner != candidate {
                sqlx::query("DELETE FROM wishlists WHERE id = ?").bind(candidate).execute(&mut *conn).await?;
            }
            debug!(wishlist_id = %winner, "resolved guest wishlist");
            Ok(winner)
        }
    }
}

async fn load_wishlist(conn: &mut SqliteConnection, id: Uuid, currency: &str) -> Result<Wishlist> {
    let user_id: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM wishlists WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound("Wishlist"))?;
    let items = sqlx::query_as::<_, EntryRow>(
        "SELECT wi.id AS id, wi.product_id AS product_id, p.name AS name, p.slug AS slug, p.price AS price, \
         p.discount AS discount, p.discount_price AS discount_price \
         FROM wishlist_items wi JOIN products p ON p.id = wi.product_id \
         WHERE wi.wishlist_id = ? ORDER BY wi.created_at, wi.rowid",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(Wishlist::restore(id, user_id, items.into_iter().map(|r| r.into_entry(currency)).collect()))
}

impl Store {
    #[instrument(skip(self))]
    pub async fn wishlist(&self, identity: &Identity) -> Result<Wishlist> {
        let mut tx = self.begin_write().await?;
        let id = resolve_wishlist_id(&mut tx, identity).await?;
        let wishlist = load_wishlist(&mut tx, id, self.currency()).await?;
        tx.commit().await?;
        Ok(wishlist)
    }

    pub async fn wishlist_items_count(&self, identity: &Identity) -> Result<i64> {
        let mut conn = self.db.acquire().await?;
        let Some(wishlist_id) = find_wishlist_id(&mut conn, identity).await? else { return Ok(0) };
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM wishlist_items WHERE wishlist_id = ?")
            .bind(wishlist_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn add_to_wishlist(&self, identity: &Identity, slug: &str) -> Result<(Wishlist, WishlistChange)> {
        let mut tx = self.begin_write().await?;
        let product = find_product_by_slug(&mut tx, slug, self.currency()).await?;
        let wishlist_id = resolve_wishlist_id(&mut tx, identity).await?;
        let inserted = sqlx::query(
            "INSERT INTO wishlist_items (id, wishlist_id, product_id, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (wishlist_id, product_id) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(wishlist_id)
        .bind(product.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let wishlist = load_wishlist(&mut tx, wishlist_id, self.currency()).await?;
        tx.commit().await?;

        let change = if inserted == 1 { WishlistChange::Added } else { WishlistChange::AlreadyPresent };
        debug!(%wishlist_id, product_id = %product.id, ?change, "wishlist add");
        Ok((wishlist, change))
    }

    /// Removes `product_id` from the caller's wishlist. An absent entry is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_from_wishlist(&self, identity: &Identity, product_id: Uuid) -> Result<(Wishlist, WishlistChange)> {
        let mut tx = self.begin_write().await?;
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 { return Err(StoreError::NotFound("Product")); }
        let wishlist_id = resolve_wishlist_id(&mut tx, identity).await?;
        let deleted = sqlx::query("DELETE FROM wishlist_items WHERE wishlist_id = ? AND product_id = ?")
            .bind(wishlist_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let wishlist = load_wishlist(&mut tx, wishlist_id, self.currency()).await?;
        tx.commit().await?;

        let change = if deleted > 0 { WishlistChange::Removed } else { WishlistChange::NotPresent };
        if !change.is_noop() { info!(%wishlist_id, %product_id, "wishlist item removed"); }
        Ok((wishlist, change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::{guest, memory_store, seed_product, user};

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let store = memory_store().await;
        let mug = seed_product(&store, "Mug", 900).await;
        let visitor = guest("w-1");
        let (_, change) = store.add_to_wishlist(&visitor, "mug").await.unwrap();
        assert_eq!(change, WishlistChange::Added);
        let (wishlist, change) = store.add_to_wishlist(&visitor, "mug").await.unwrap();
        assert_eq!(change, WishlistChange::AlreadyPresent);
        assert_eq!(wishlist.len(), 1);
        assert!(wishlist.contains(mug.id));
        assert_eq!(store.wishlist_items_count(&visitor).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_item_is_noop() {
        let store = memory_store().await;
        let mug = seed_product(&store, "Mug", 900).await;
        let alice = user();
        let (wishlist, change) = store.remove_from_wishlist(&alice, mug.id).await.unwrap();
        assert_eq!(change, WishlistChange::NotPresent);
        assert!(wishlist.is_empty());

        store.add_to_wishlist(&alice, "mug").await.unwrap();
        let (wishlist, change) = store.remove_from_wishlist(&alice, mug.id).await.unwrap();
        assert_eq!(change, WishlistChange::Removed);
        assert!(wishlist.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_product_is_not_found() {
        let store = memory_store().await;
        let err = store.remove_from_wishlist(&user(), Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Product")));
        assert_eq!(store.wishlist_items_count(&user()).await.unwrap(), 0);
    }
}
