//! Product reviews

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{Rating, RatingError};

#[derive(Clone, Debug, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ReviewDraft {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

impl Review {
    pub fn write(product_id: Uuid, user_id: Uuid, draft: &ReviewDraft, now: DateTime<Utc>) -> Result<Self, RatingError> {
        Ok(Self {
            id: Uuid::now_v7(), product_id, user_id, rating: Rating::new(draft.rating)?,
            comment: draft.comment.trim().to_string(), created_at: now,
        })
    }
}

/// Mean rating rounded to one decimal, `None` without reviews.
pub fn average_rating(reviews: &[Review]) -> Option<Decimal> {
    if reviews.is_empty() { return None; }
    let sum: Decimal = reviews.iter().map(|r| Decimal::from(r.rating.value())).sum();
    Some((sum / Decimal::from(reviews.len())).round_dp(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8) -> Review {
        Review::write(Uuid::nil(), Uuid::nil(), &ReviewDraft { rating, comment: " ok ".into() }, Utc::now()).unwrap()
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[review(5), review(4), review(4)]), Some(Decimal::new(43, 1)));
        assert_eq!(review(3).comment, "ok");
    }

    #[test]
    fn test_rating_bounds() {
        let draft = ReviewDraft { rating: 0, comment: "bad".into() };
        assert!(Review::write(Uuid::nil(), Uuid::nil(), &draft, Utc::now()).is_err());
        assert!(draft.validate().is_err());
    }
}
