//! SQLite persistence.
//!
//! `Store` owns the pool and the store currency; each submodule adds the
//! queries for one part of the storefront. Multi-row changes run inside a
//! single transaction and the free helpers take `&mut SqliteConnection` so
//! they can be called with either a pooled connection or a transaction.

pub mod carts;
pub mod catalog;
pub mod orders;
pub mod profiles;
pub mod sessions;
pub mod wishlists;

#[cfg(test)]
pub(crate) mod test_utils;

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Transaction;
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{info, instrument};

use crate::{Result, StoreError};

pub type Db = SqlitePool;

#[derive(Clone, Debug)]
pub struct Store {
    db: Db,
    currency: Arc<str>,
}

impl Store {
    pub fn new(db: Db, currency: &str) -> Self { Self { db, currency: Arc::from(currency) } }
    pub fn db(&self) -> &Db { &self.db }
    pub fn currency(&self) -> &str { &self.currency }

    /// Opens a transaction whose first statement takes the database write lock,
    /// so overlapping writers wait out `busy_timeout` instead of failing on a
    /// stale WAL snapshot.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE write_lock SET taken_at = ? WHERE id = 1")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[instrument]
pub async fn connect(url: &str, max_connections: u32) -> Result<Db> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let db = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    info!("database pool ready");
    Ok(db)
}

/// A private in-memory database. The pool holds exactly one connection that
/// never expires, since closing it would drop the data.
pub async fn connect_in_memory() -> Result<Db> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(options)
        .await?;
    Ok(db)
}

pub async fn migrate(db: &Db) -> Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub num_pages: u32,
}

/// Requested page clamped into `1..=num_pages`; an empty result still has one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow { pub page: u32, pub per_page: u32, pub num_pages: u32 }

impl PageWindow {
    pub(crate) fn new(requested: Option<u32>, per_page: u32, total: i64) -> Self {
        let per_page = per_page.max(1);
        let total = u64::try_from(total).unwrap_or(0);
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        let num_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        let page = requested.unwrap_or(1).clamp(1, num_pages);
        Self { page, per_page, num_pages }
    }

    pub(crate) fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub(crate) fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }

    pub(crate) fn wrap<T>(self, data: Vec<T>, total: i64) -> Page<T> {
        Page { data, total, page: self.page, per_page: self.per_page, num_pages: self.num_pages }
    }
}

/// `%term%` for `LIKE ... ESCAPE '\'`, with wildcards in the term escaped.
/// Only ASCII is folded, matching SQLite's `lower()`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_ascii_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') { pattern.push('\\'); }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Maps a unique-constraint violation to a 409, passing other errors through.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message.to_string()),
        _ => StoreError::Database(e),
    }
}
