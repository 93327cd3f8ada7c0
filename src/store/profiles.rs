//! User profiles, created on first read.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{NotificationPrefs, Profile, ProfileUpdate};
use crate::store::Store;
use crate::Result;

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    address: String,
    notify_blog: bool,
    notify_news: bool,
    notify_offers: bool,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        Profile {
            user_id: r.user_id,
            first_name: r.first_name,
            last_name: r.last_name,
            address: r.address,
            notifications: NotificationPrefs { blog: r.notify_blog, news: r.notify_news, offers: r.notify_offers },
            updated_at: r.updated_at,
        }
    }
}

async fn get_or_create(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Profile> {
    let blank = Profile::blank(user_id, Utc::now());
    sqlx::query("INSERT INTO profiles (user_id, updated_at) VALUES (?, ?) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .bind(blank.updated_at)
        .execute(&mut *conn)
        .await?;
    let row = sqlx::query_as::<_, ProfileRow>(
        "SELECT user_id, first_name, last_name, address, notify_blog, notify_news, notify_offers, updated_at FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.into())
}

impl Store {
    pub async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        let mut conn = self.db.acquire().await?;
        get_or_create(&mut conn, user_id).await
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile> {
        let mut tx = self.begin_write().await?;
        let mut profile = get_or_create(&mut tx, user_id).await?;
        profile.apply(update, Utc::now());
        sqlx::query(
            "UPDATE profiles SET first_name = ?, last_name = ?, address = ?, notify_blog = ?, notify_news = ?, \
             notify_offers = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.address)
        .bind(profile.notifications.blog)
        .bind(profile.notifications.news)
        .bind(profile.notifications.offers)
        .bind(profile.updated_at)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        info!(%user_id, "profile updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::memory_store;

    #[tokio::test]
    async fn test_profile_get_or_create_then_update() {
        let store = memory_store().await;
        let user_id = Uuid::now_v7();
        let blank = store.profile(user_id).await.unwrap();
        assert!(blank.first_name.is_empty());
        assert_eq!(blank.notifications, NotificationPrefs::default());

        let update = ProfileUpdate {
            first_name: "Grace".into(),
            address: "1 Harbour Rd".into(),
            notifications: NotificationPrefs { offers: true, ..Default::default() },
            ..Default::default()
        };
        store.update_profile(user_id, &update).await.unwrap();
        let reloaded = store.profile(user_id).await.unwrap();
        assert_eq!(reloaded.first_name, "Grace");
        assert_eq!(reloaded.address, "1 Harbour Rd");
        assert!(reloaded.notifications.offers && !reloaded.notifications.news);
    }
}
