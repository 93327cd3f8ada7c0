//! Catalog queries: products, categories, images, reviews and newsletter signups.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Category, Product, ProductDraft, ProductImage, Review, ReviewDraft};
use crate::domain::value_objects::{DiscountPercent, Money, Rating, Slug};
use crate::store::{conflict_on_unique, like_pattern, Page, PageWindow, Store};
use crate::{Result, StoreError};

const SIDEBAR_LIMIT: i64 = 3;

pub(crate) const PRODUCT_COLUMNS: &str = "p.id AS id, p.name AS name, p.slug AS slug, p.description AS description, \
    p.details AS details, p.price AS price, p.discount AS discount, p.discount_value AS discount_value, \
    p.discount_price AS discount_price, p.shipping_fee AS shipping_fee, p.is_new AS is_new, p.hot_deal AS hot_deal, \
    p.sales AS sales, p.created_at AS created_at, p.updated_at AS updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    details: String,
    price: i64,
    discount: bool,
    discount_value: i64,
    discount_price: i64,
    shipping_fee: i64,
    is_new: bool,
    hot_deal: bool,
    sales: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    pub(crate) fn into_product(self, currency: &str) -> Product {
        let discount_value = u8::try_from(self.discount_value).ok().and_then(|v| DiscountPercent::new(v).ok()).unwrap_or_default();
        Product {
            id: self.id,
            name: self.name,
            slug: Slug::from_stored(self.slug),
            description: self.description,
            details: self.details,
            price: Money::from_minor(self.price, currency),
            discount: self.discount,
            discount_value,
            discount_price: Money::from_minor(self.discount_price, currency),
            shipping_fee: Money::from_minor(self.shipping_fee, currency),
            is_new: self.is_new,
            hot_deal: self.hot_deal,
            sales: self.sales,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow { id: Uuid, product_id: Uuid, user_id: Uuid, rating: i64, comment: String, created_at: DateTime<Utc> }

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;
    fn try_from(row: ReviewRow) -> Result<Self> {
        let rating = u8::try_from(row.rating).map_err(|_| StoreError::InvalidInput(format!("stored rating {} out of range", row.rating)))?;
        Ok(Review { id: row.id, product_id: row.product_id, user_id: row.user_id, rating: Rating::new(rating)?, comment: row.comment, created_at: row.created_at })
    }
}

/// Listing order for `GET /`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    #[default]
    Newest,
    /// Best sellers first.
    Popular,
    /// Catalog insertion order.
    Position,
}

impl ProductSort {
    /// Unknown values fall back to the default order.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("popular") => Self::Popular,
            Some("position") => Self::Position,
            _ => Self::Newest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.rowid DESC",
            Self::Popular => "p.sales DESC, p.created_at DESC, p.rowid DESC",
            Self::Position => "p.created_at ASC, p.rowid ASC",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sidebars {
    pub recent_products: Vec<Product>,
    pub new_products: Vec<Product>,
    pub hot_deals: Vec<Product>,
    pub top_selling: Vec<Product>,
}

async fn ensure_slug_free(conn: &mut SqliteConnection, slug: &Slug, except: Uuid) -> Result<()> {
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE slug = ? AND id != ?")
        .bind(slug.as_str())
        .bind(except)
        .fetch_one(&mut *conn)
        .await?;
    if taken > 0 { return Err(StoreError::Conflict(format!("slug '{slug}' is already in use"))); }
    Ok(())
}

/// Replaces the product's category links.
async fn link_categories(conn: &mut SqliteConnection, product_id: Uuid, categories: &[Uuid]) -> Result<()> {
    sqlx::query("DELETE FROM product_categories WHERE product_id = ?").bind(product_id).execute(&mut *conn).await?;
    for category_id in categories {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 { return Err(StoreError::NotFound("Category")); }
        sqlx::query("INSERT OR IGNORE INTO product_categories (product_id, category_id) VALUES (?, ?)")
            .bind(product_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn write_product(conn: &mut SqliteConnection, product: &Product) -> Result<()> {
    sqlx::query(
        "INSERT INTO products (id, name, slug, description, details, price, discount, discount_value, discount_price, \
         shipping_fee, is_new, hot_deal, sales, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (id) DO UPDATE SET name = excluded.name, slug = excluded.slug, description = excluded.description, \
         details = excluded.details, price = excluded.price, discount = excluded.discount, \
         discount_value = excluded.discount_value, discount_price = excluded.discount_price, \
         shipping_fee = excluded.shipping_fee, is_new = excluded.is_new, hot_deal = excluded.hot_deal, \
         updated_at = excluded.updated_at",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.slug.as_str())
    .bind(&product.description)
    .bind(&product.details)
    .bind(product.price.minor_units())
    .bind(product.discount)
    .bind(i64::from(product.discount_value.value()))
    .bind(product.discount_price.minor_units())
    .bind(product.shipping_fee.minor_units())
    .bind(product.is_new)
    .bind(product.hot_deal)
    .bind(product.sales)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, "slug is already in use"))?;
    Ok(())
}

pub(crate) async fn find_product_by_slug(conn: &mut SqliteConnection, slug: &str, currency: &str) -> Result<Product> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = ?"))
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::NotFound("Product"))?;
    Ok(row.into_product(currency))
}

impl Store {
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() { return Err(StoreError::InvalidInput("category name is required".into())); }
        let category = Category { id: Uuid::now_v7(), name: name.to_string() };
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
            .bind(category.id)
            .bind(&category.name)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    /// Inserts the product and its category links in one transaction.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product> {
        let product = Product::create(draft, self.currency(), Utc::now())?;
        let mut tx = self.begin_write().await?;
        ensure_slug_free(&mut tx, &product.slug, product.id).await?;
        write_product(&mut tx, &product).await?;
        link_categories(&mut tx, product.id, &draft.categories).await?;
        tx.commit().await?;
        info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    /// Applies a draft to an existing product; discount price is recomputed.
    #[instrument(skip(self, draft))]
    pub async fn update_product(&self, slug: &str, draft: &ProductDraft) -> Result<Product> {
        let mut tx = self.begin_write().await?;
        let mut product = find_product_by_slug(&mut tx, slug, self.currency()).await?;
        product.revise(draft, Utc::now())?;
        ensure_slug_free(&mut tx, &product.slug, product.id).await?;
        write_product(&mut tx, &product).await?;
        link_categories(&mut tx, product.id, &draft.categories).await?;
        tx.commit().await?;
        info!(product_id = %product.id, "product revised");
        Ok(product)
    }

    pub async fn product_by_slug(&self, slug: &str) -> Result<Product> {
        let mut conn = self.db.acquire().await?;
        find_product_by_slug(&mut conn, slug, self.currency()).await
    }

    pub async fn product_by_id(&self, id: Uuid) -> Result<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound("Product"))?;
        Ok(row.into_product(self.currency()))
    }

    #[instrument(skip(self))]
    pub async fn add_product_image(&self, slug: &str, path: &str) -> Result<ProductImage> {
        let product = self.product_by_slug(slug).await?;
        let image = ProductImage { id: Uuid::now_v7(), product_id: product.id, path: path.trim().to_string(), created_at: Utc::now() };
        sqlx::query("INSERT INTO product_images (id, product_id, path, created_at) VALUES (?, ?, ?, ?)")
            .bind(image.id)
            .bind(image.product_id)
            .bind(&image.path)
            .bind(image.created_at)
            .execute(&self.db)
            .await?;
        Ok(image)
    }

    pub async fn product_images(&self, product_id: Uuid) -> Result<Vec<ProductImage>> {
        let images = sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, path, created_at FROM product_images WHERE product_id = ? ORDER BY created_at, rowid",
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(images)
    }

    pub async fn product_categories(&self, product_id: Uuid) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT c.id AS id, c.name AS name FROM categories c \
             JOIN product_categories pc ON pc.category_id = c.id WHERE pc.product_id = ? ORDER BY c.name",
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    /// Paginated listing with optional case-insensitive search on name or description.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery, per_page: u32) -> Result<Page<Product>> {
        let pattern = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
        let filter = if pattern.is_some() {
            " WHERE (lower(p.name) LIKE ? ESCAPE '\\' OR lower(p.description) LIKE ? ESCAPE '\\')"
        } else {
            ""
        };

        let count_sql = format!("SELECT COUNT(*) FROM products p{filter}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(p) = &pattern { count = count.bind(p.clone()).bind(p.clone()); }
        let total = count.fetch_one(&self.db).await?;

        let window = PageWindow::new(query.page, per_page, total);
        let list_sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p{filter} ORDER BY {} LIMIT ? OFFSET ?", query.sort.order_by());
        let mut list = sqlx::query_as::<_, ProductRow>(&list_sql);
        if let Some(p) = &pattern { list = list.bind(p.clone()).bind(p.clone()); }
        let rows = list.bind(window.limit()).bind(window.offset()).fetch_all(&self.db).await?;
        debug!(total, page = window.page, "product listing");

        let currency = self.currency();
        Ok(window.wrap(rows.into_iter().map(|r| r.into_product(currency)).collect(), total))
    }

    async fn fetch_products(&self, tail: &str, limit: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products p {tail} LIMIT ?"))
            .bind(limit)
            .fetch_all(&self.db)
            .await?;
        let currency = self.currency();
        Ok(rows.into_iter().map(|r| r.into_product(currency)).collect())
    }

    pub async fn sidebars(&self) -> Result<Sidebars> {
        Ok(Sidebars {
            recent_products: self.fetch_products("ORDER BY p.created_at DESC, p.rowid DESC", SIDEBAR_LIMIT).await?,
            new_products: self.fetch_products("WHERE p.is_new = 1 ORDER BY p.created_at DESC, p.rowid DESC", SIDEBAR_LIMIT).await?,
            hot_deals: self.fetch_products("WHERE p.hot_deal = 1 ORDER BY p.created_at DESC, p.rowid DESC", SIDEBAR_LIMIT).await?,
            top_selling: self.fetch_products("ORDER BY p.sales DESC, p.created_at DESC, p.rowid DESC", SIDEBAR_LIMIT).await?,
        })
    }

    /// Products sharing at least one category with `product`, newest first.
    pub async fn related_products(&self, product: &Product, page: Option<u32>, per_page: u32) -> Result<Page<Product>> {
        const RELATED: &str = " FROM products p WHERE p.id != ? AND EXISTS (\
            SELECT 1 FROM product_categories mine JOIN product_categories theirs ON theirs.category_id = mine.category_id \
            WHERE mine.product_id = ? AND theirs.product_id = p.id)";
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*){RELATED}"))
            .bind(product.id)
            .bind(product.id)
            .fetch_one(&self.db)
            .await?;
        let window = PageWindow::new(page, per_page, total);
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}{RELATED} ORDER BY p.created_at DESC, p.rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(product.id)
        .bind(product.id)
        .bind(window.limit())
        .bind(window.offset())
        .fetch_all(&self.db)
        .await?;
        let currency = self.currency();
        Ok(window.wrap(rows.into_iter().map(|r| r.into_product(currency)).collect(), total))
    }

    #[instrument(skip(self, draft))]
    pub async fn add_review(&self, slug: &str, user_id: Uuid, draft: &ReviewDraft) -> Result<Review> {
        let product = self.product_by_slug(slug).await?;
        let review = Review::write(product.id, user_id, draft, Utc::now())?;
        sqlx::query("INSERT INTO reviews (id, product_id, user_id, rating, comment, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(review.id)
            .bind(review.product_id)
            .bind(review.user_id)
            .bind(i64::from(review.rating.value()))
            .bind(&review.comment)
            .bind(review.created_at)
            .execute(&self.db)
            .await?;
        info!(product_id = %product.id, rating = review.rating.value(), "review added");
        Ok(review)
    }

    pub async fn reviews_for(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, product_id, user_id, rating, comment, created_at FROM reviews WHERE product_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Review::try_from).collect()
    }

    /// Returns `false` when the address was already subscribed.
    #[instrument(skip(self))]
    pub async fn subscribe_newsletter(&self, email: &str) -> Result<bool> {
        let inserted = sqlx::query("INSERT INTO newsletter_subscribers (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT (email) DO NOTHING")
            .bind(Uuid::now_v7())
            .bind(email.trim().to_lowercase())
            .bind(Utc::now())
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(inserted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::{memory_store, seed_product};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_create_product_persists_discount_price() {
        let store = memory_store().await;
        let draft = ProductDraft::new("Walnut Desk", Decimal::new(19999, 2)).with_discount(10);
        let created = store.create_product(&draft).await.unwrap();
        let loaded = store.product_by_slug("walnut-desk").await.unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.discount_price.minor_units(), 17999);
        assert_eq!(loaded.effective_price().minor_units(), 17999);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let store = memory_store().await;
        seed_product(&store, "Mug", 500).await;
        let err = store.create_product(&ProductDraft::new("Mug", Decimal::ONE)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_recomputes_discount_and_keeps_slug() {
        let store = memory_store().await;
        seed_product(&store, "Lamp", 4000).await;
        let mut draft = ProductDraft::new("Desk Lamp", Decimal::new(4000, 2)).with_discount(25);
        let updated = store.update_product("lamp", &draft).await.unwrap();
        assert_eq!(updated.slug.as_str(), "lamp");
        assert_eq!(store.product_by_slug("lamp").await.unwrap().discount_price.minor_units(), 3000);

        draft.discount = false;
        store.update_product("lamp", &draft).await.unwrap();
        let reloaded = store.product_by_slug("lamp").await.unwrap();
        assert_eq!(reloaded.discount_price, reloaded.price);
        assert_eq!(reloaded.name, "Desk Lamp");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_on_name_and_description() {
        let store = memory_store().await;
        let mut draft = ProductDraft::new("Plain Tee", Decimal::new(1500, 2));
        draft.description = "Soft COTTON shirt".into();
        store.create_product(&draft).await.unwrap();
        seed_product(&store, "Cotton Socks", 300).await;
        seed_product(&store, "Steel Bottle", 2000).await;

        let query = ProductQuery { search: Some("cOtToN".into()), ..Default::default() };
        let page = store.list_products(&query, 20).await.unwrap();
        assert_eq!(page.total, 2);
        let mut names: Vec<_> = page.data.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["Cotton Socks", "Plain Tee"]);

        let query = ProductQuery { search: Some("100%".into()), ..Default::default() };
        assert_eq!(store.list_products(&query, 20).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_search_matches_non_ascii_terms() {
        let store = memory_store().await;
        seed_product(&store, "Éclair Box", 1200).await;
        seed_product(&store, "Eclair Tin", 800).await;

        let query = ProductQuery { search: Some("Éclair".into()), ..Default::default() };
        let page = store.list_products(&query, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].name, "Éclair Box");

        let query = ProductQuery { search: Some("ÉCLAIR BOX".into()), ..Default::default() };
        assert_eq!(store.list_products(&query, 20).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_listing_sort_and_pagination() {
        let store = memory_store().await;
        for (name, sales) in [("A", 5), ("B", 50), ("C", 1)] {
            let p = seed_product(&store, name, 100).await;
            sqlx::query("UPDATE products SET sales = ? WHERE id = ?").bind(sales).bind(p.id).execute(store.db()).await.unwrap();
        }
        let popular = store.list_products(&ProductQuery { sort: ProductSort::Popular, ..Default::default() }, 20).await.unwrap();
        assert_eq!(popular.data.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["B", "A", "C"]);

        let position = store.list_products(&ProductQuery { sort: ProductSort::Position, page: Some(2), ..Default::default() }, 2).await.unwrap();
        assert_eq!((position.page, position.num_pages, position.total), (2, 2, 3));
        assert_eq!(position.data.len(), 1);
        assert_eq!(position.data[0].name, "C");

        let sidebars = store.sidebars().await.unwrap();
        assert_eq!(sidebars.top_selling[0].name, "B");
        assert_eq!(sidebars.recent_products[0].name, "C");
        assert!(sidebars.hot_deals.is_empty());
        assert_eq!(ProductSort::parse(Some("bogus")), ProductSort::Newest);
    }

    #[tokio::test]
    async fn test_related_products_share_a_category() {
        let store = memory_store().await;
        let kitchen = store.create_category("Kitchen").await.unwrap();
        let garden = store.create_category("Garden").await.unwrap();
        let mut draft = ProductDraft::new("Pan", Decimal::ONE);
        draft.categories = vec![kitchen.id];
        let pan = store.create_product(&draft).await.unwrap();
        draft.name = "Pot".into();
        draft.categories = vec![kitchen.id, garden.id];
        store.create_product(&draft).await.unwrap();
        draft.name = "Hose".into();
        draft.categories = vec![garden.id];
        store.create_product(&draft).await.unwrap();

        let related = store.related_products(&pan, None, 4).await.unwrap();
        assert_eq!(related.data.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["Pot"]);
        assert_eq!(store.product_categories(pan.id).await.unwrap().len(), 1);

        draft.name = "Rake".into();
        draft.categories = vec![Uuid::now_v7()];
        assert!(matches!(store.create_product(&draft).await, Err(StoreError::NotFound("Category"))));
        assert!(store.product_by_slug("rake").await.is_err());
    }

    #[tokio::test]
    async fn test_reviews_images_and_newsletter() {
        let store = memory_store().await;
        let mug = seed_product(&store, "Mug", 900).await;
        let user = Uuid::new_v4();
        store.add_review("mug", user, &ReviewDraft { rating: 4, comment: "Sturdy".into() }).await.unwrap();
        assert!(store.add_review("mug", user, &ReviewDraft { rating: 9, comment: "x".into() }).await.is_err());
        let reviews = store.reviews_for(mug.id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating.value(), 4);

        store.add_product_image("mug", "products/mug.jpg").await.unwrap();
        assert_eq!(store.product_images(mug.id).await.unwrap()[0].path, "products/mug.jpg");

        assert!(store.subscribe_newsletter("Ada@Example.com").await.unwrap());
        assert!(!store.subscribe_newsletter("ada@example.com ").await.unwrap());
    }
}
