use std::sync::Arc;

use bytes::Bytes;
use rusqlite::{params, Connection};

use super::types::{NewReview, PostedReview, WishState};
use crate::db::is_foreign_key_violation;
use crate::db::models::{Review, REVIEW_COLUMNS};
use crate::error::{conflict_on_duplicate, AppError, AppResult};
use crate::state::DbPool;
use crate::storage::{new_image_key, upload_after_commit, ImageKind, ImageStore, ImageUrlResolver};

/// Writes to a user's visited list, wish list and review likes.
#[derive(Clone)]
pub struct Visits {
    db: DbPool,
    images: Arc<dyn ImageStore>,
    urls: ImageUrlResolver,
}

impl Visits {
    pub fn new(db: DbPool, images: Arc<dyn ImageStore>, urls: ImageUrlResolver) -> Self {
        Self { db, images, urls }
    }

    /// Put a restaurant in the user's visited list together with its review.
    ///
    /// The review and visit rows commit together. The photo, if any, is
    /// uploaded afterwards under a key the review already points at.
    pub async fn add_visit(
        &self,
        user: &str,
        restaurant_id: i64,
        review: NewReview,
        image: Option<Bytes>,
    ) -> AppResult<PostedReview> {
        review.validate()?;
        let image_key = image.as_ref().map(|_| new_image_key(ImageKind::Review));

        let stored = {
            let mut conn = self.db.get()?;
            let tx = conn.transaction()?;
            ensure_restaurant(&tx, restaurant_id)?;

            tx.execute(
                "INSERT INTO reviews (user_id, restaurant_id, is_car_visit, car_visit_ability,
                                      taste, service, restroom_cleanliness, overall_experience,
                                      review_image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user,
                    restaurant_id,
                    review.is_car_visit,
                    review.car_visit_ability,
                    review.taste,
                    review.service,
                    review.restroom_cleanliness,
                    review.overall_experience,
                    image_key,
                ],
            )?;
            let review_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO user_restaurants (user_id, restaurant_id, review_id) VALUES (?1, ?2, ?3)",
                params![user, restaurant_id, review_id],
            )
            .map_err(|e| conflict_on_duplicate(e, "Visit"))?;

            let stored = tx.query_row(
                &format!("SELECT {} FROM reviews WHERE id = ?1", REVIEW_COLUMNS),
                params![review_id],
                Review::from_row,
            )?;
            tx.commit()?;
            stored
        };

        if let (Some(key), Some(data)) = (image_key.as_deref(), image) {
            upload_after_commit(self.images.as_ref(), key, data).await;
        }

        tracing::info!(user, restaurant_id, review_id = stored.id, "Visit added");
        Ok(self.posted(stored))
    }

    fn posted(&self, review: Review) -> PostedReview {
        PostedReview {
            id: review.id,
            restaurant_id: review.restaurant_id,
            is_car_visit: review.is_car_visit,
            car_visit_ability: review.car_visit_ability,
            taste: review.taste,
            service: review.service,
            restroom_cleanliness: review.restroom_cleanliness,
            overall_experience: review.overall_experience,
            review_image: review.review_image.map(|key| self.urls.resolve(&key)),
            created_at: review.created_at,
        }
    }

    /// Drop a restaurant from the visited list along with the review posted
    /// with it. Missing entries are a no-op.
    pub fn remove_visit(&self, user: &str, restaurant_id: i64) -> AppResult<bool> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;
        let review_id: Option<Option<i64>> = {
            let mut stmt = tx.prepare(
                "DELETE FROM user_restaurants WHERE user_id = ?1 AND restaurant_id = ?2
                 RETURNING review_id",
            )?;
            let mut rows = stmt.query_map(params![user, restaurant_id], |row| row.get(0))?;
            rows.next().transpose()?
        };
        if let Some(Some(review_id)) = review_id {
            tx.execute(
                "DELETE FROM reviews WHERE id = ?1 AND user_id = ?2",
                params![review_id, user],
            )?;
        }
        tx.commit()?;
        Ok(review_id.is_some())
    }

    pub fn add_wish(&self, user: &str, restaurant_id: i64) -> AppResult<()> {
        let conn = self.db.get()?;
        ensure_restaurant(&conn, restaurant_id)?;
        conn.execute(
            "INSERT INTO wish_restaurants (user_id, restaurant_id) VALUES (?1, ?2)",
            params![user, restaurant_id],
        )
        .map_err(|e| conflict_on_duplicate(e, "Wish"))?;
        Ok(())
    }

    pub fn remove_wish(&self, user: &str, restaurant_id: i64) -> AppResult<bool> {
        let conn = self.db.get()?;
        let removed = conn.execute(
            "DELETE FROM wish_restaurants WHERE user_id = ?1 AND restaurant_id = ?2",
            params![user, restaurant_id],
        )?;
        Ok(removed > 0)
    }

    pub fn is_wish(&self, user: &str, restaurant_id: i64) -> AppResult<WishState> {
        let conn = self.db.get()?;
        let is_wish = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM wish_restaurants WHERE user_id = ?1 AND restaurant_id = ?2)",
            params![user, restaurant_id],
            |row| row.get(0),
        )?;
        Ok(WishState { is_wish })
    }

    /// Record the caller's like or dislike of a review, replacing any earlier
    /// annotation.
    pub fn like_review(&self, user: &str, review_id: i64, is_like: bool) -> AppResult<()> {
        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO review_likes (review_id, user_id, is_like) VALUES (?1, ?2, ?3)
             ON CONFLICT (review_id, user_id) DO UPDATE SET is_like = excluded.is_like",
            params![review_id, user, is_like],
        )
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Review not found".into())
            } else {
                AppError::Database(e)
            }
        })?;
        Ok(())
    }

    pub fn unlike_review(&self, user: &str, review_id: i64) -> AppResult<bool> {
        let conn = self.db.get()?;
        let removed = conn.execute(
            "DELETE FROM review_likes WHERE review_id = ?1 AND user_id = ?2",
            params![review_id, user],
        )?;
        Ok(removed > 0)
    }
}

fn ensure_restaurant(conn: &Connection, restaurant_id: i64) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM restaurants WHERE id = ?1)",
        params![restaurant_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound("Restaurant not found".into()));
    }
    Ok(())
}
