//! Test helpers

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductDraft};
use crate::domain::value_objects::Identity;
use crate::store::{connect, connect_in_memory, migrate, Store};

/// Fresh migrated in-memory store per test.
pub(crate) async fn memory_store() -> Store {
    let db = connect_in_memory().await.expect("in-memory sqlite");
    migrate(&db).await.expect("migrations");
    Store::new(db, "USD")
}

/// Migrated store on a temporary database file, for tests that need a pool
/// of several connections.
pub(crate) async fn file_store(max_connections: u32) -> (Store, PathBuf) {
    let path = std::env::temp_dir().join(format!("storefront-{}.db", Uuid::new_v4()));
    let db = connect(&format!("sqlite://{}", path.display()), max_connections).await.expect("file sqlite");
    migrate(&db).await.expect("migrations");
    (Store::new(db, "USD"), path)
}

pub(crate) async fn remove_file_store(store: Store, path: &Path) {
    store.db().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

pub(crate) async fn seed_product(store: &Store, name: &str, price_minor: i64) -> Product {
    store.create_product(&ProductDraft::new(name, Decimal::new(price_minor, 2))).await.expect("seed product")
}

pub(crate) fn guest(token: &str) -> Identity { Identity::Guest(token.to_string()) }

pub(crate) fn user() -> Identity { Identity::User(Uuid::new_v4()) }
