//! Customer profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs { pub blog: bool, pub news: bool, pub offers: bool }

#[derive(Clone, Debug, Serialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub notifications: NotificationPrefs,
    pub updated_at: DateTime<Utc>,
}

/// Profile form. Missing fields reset to empty, matching a full form post.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub address: String,
    #[serde(default)]
    pub notifications: NotificationPrefs,
    #[serde(default)]
    pub logout: bool,
}

impl Profile {
    pub fn blank(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id, first_name: String::new(), last_name: String::new(), address: String::new(),
            notifications: NotificationPrefs::default(), updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        self.first_name = update.first_name.trim().to_string();
        self.last_name = update.last_name.trim().to_string();
        self.address = update.address.trim().to_string();
        self.notifications = update.notifications.clone();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overwrites_every_field() {
        let mut profile = Profile::blank(Uuid::nil(), Utc::now());
        profile.address = "old".into();
        let update = ProfileUpdate {
            first_name: " Ada ".into(),
            notifications: NotificationPrefs { news: true, ..Default::default() },
            ..Default::default()
        };
        profile.apply(&update, Utc::now());
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.address, "");
        assert!(profile.notifications.news && !profile.notifications.blog);
    }
}
