//! Anonymous session rows: the server-side half of a guest's cart and wishlist.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::store::Store;
use crate::Result;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub cart_id: Option<Uuid>,
    pub wishlist_id: Option<Uuid>,
}

pub(crate) async fn find_session(conn: &mut SqliteConnection, token: &str) -> Result<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>("SELECT cart_id, wishlist_id FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

pub(crate) async fn ensure_session(conn: &mut SqliteConnection, token: &str) -> Result<SessionRow> {
    let now = Utc::now();
    sqlx::query("INSERT INTO sessions (token, created_at, updated_at) VALUES (?, ?, ?) ON CONFLICT (token) DO NOTHING")
        .bind(token)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let row = sqlx::query_as::<_, SessionRow>("SELECT cart_id, wishlist_id FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

/// Which session column a guest collection id is stored in.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionSlot { Cart, Wishlist }

impl SessionSlot {
    fn column(self) -> &'static str { match self { Self::Cart => "cart_id", Self::Wishlist => "wishlist_id" } }
}

/// Stores `id` in the session slot unless another request filled it first.
/// Returns the id the session ends up holding.
pub(crate) async fn claim_slot(conn: &mut SqliteConnection, token: &str, slot: SessionSlot, id: Uuid) -> Result<Option<Uuid>> {
    let column = slot.column();
    let claimed = sqlx::query(&format!("UPDATE sessions SET {column} = ?, updated_at = ? WHERE token = ? AND {column} IS NULL"))
        .bind(id)
        .bind(Utc::now())
        .bind(token)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if claimed == 1 { return Ok(Some(id)); }
    let current: Option<Option<Uuid>> = sqlx::query_scalar(&format!("SELECT {column} FROM sessions WHERE token = ?"))
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;
    debug!(?slot, "session slot already claimed");
    Ok(current.flatten())
}

impl Store {
    /// Deletes the session row together with the guest cart and wishlist it held.
    #[instrument(skip(self))]
    pub async fn flush_session(&self, token: &str) -> Result<bool> {
        let mut tx = self.begin_write().await?;
        let Some(session) = find_session(&mut tx, token).await? else { return Ok(false) };
        sqlx::query("DELETE FROM sessions WHERE token = ?").bind(token).execute(&mut *tx).await?;
        if let Some(cart_id) = session.cart_id {
            sqlx::query("DELETE FROM carts WHERE id = ? AND user_id IS NULL").bind(cart_id).execute(&mut *tx).await?;
        }
        if let Some(wishlist_id) = session.wishlist_id {
            sqlx::query("DELETE FROM wishlists WHERE id = ? AND user_id IS NULL").bind(wishlist_id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        debug!(cart = ?session.cart_id, wishlist = ?session.wishlist_id, "session flushed");
        Ok(true)
    }
}
