use bytes::Bytes;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;

use super::domain::*;
use crate::auth::password::hash_password;
use crate::db::models::{User, USER_COLUMNS};
use crate::error::{conflict_on_duplicate, AppError, AppResult};
use crate::follow::{following_ids, is_following_in};
use crate::restaurants::{ListQuery, RestaurantListAggregator};
use crate::state::DbPool;
use crate::storage::{
    new_image_key, upload_after_commit, ImageKind, ImageStore, ImageUrlResolver,
    DEFAULT_PROFILE_IMAGE,
};

/// Most users a nickname search returns.
pub const SEARCH_LIMIT: usize = 20;

/// Identity lookups, account lifecycle and user listings.
#[derive(Clone)]
pub struct UserDirectory {
    db: DbPool,
    images: Arc<dyn ImageStore>,
    urls: ImageUrlResolver,
    restaurants: RestaurantListAggregator,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(
        db: DbPool,
        images: Arc<dyn ImageStore>,
        urls: ImageUrlResolver,
        restaurants: RestaurantListAggregator,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db,
            images,
            urls,
            restaurants,
            bcrypt_cost,
        }
    }

    /// Create an account. Returns the new user id.
    ///
    /// The row is written first and the image uploaded afterwards.
    pub async fn signup(&self, new_user: NewUser, image: Option<Bytes>) -> AppResult<String> {
        let password_hash = match (&new_user.provider, &new_user.password) {
            (_, Some(plain)) if !plain.is_empty() => Some(hash_password(plain, self.bcrypt_cost)?),
            (Provider::Site, _) => {
                return Err(AppError::Validation("Password is required".into()));
            }
            _ => None,
        };

        let upload = image.map(|data| (new_image_key(ImageKind::Profile), data));
        let profile_image = upload
            .as_ref()
            .map(|(key, _)| key.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE_IMAGE.to_string());

        let id = uuid::Uuid::now_v7().to_string();
        {
            let mut conn = self.db.get()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_unique(&tx, new_user.nickname.as_str(), Some(new_user.email.as_str()), None)?;
            tx.execute(
                "INSERT INTO users (id, email, nickname, provider, region, birthdate, profile_image, password_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    new_user.email,
                    new_user.nickname.as_str(),
                    new_user.provider.as_str(),
                    new_user.region,
                    new_user.birthdate.map(BirthDate::into_inner),
                    profile_image,
                    password_hash,
                ],
            )
            .map_err(|e| conflict_on_duplicate(e, "User"))?;
            tx.commit()?;
        }

        if let Some((key, data)) = upload {
            upload_after_commit(self.images.as_ref(), &key, data).await;
        }

        tracing::info!(user_id = %id, nickname = %new_user.nickname, "User signed up");
        Ok(id)
    }

    pub fn get_by_nickname(&self, nickname: &str) -> AppResult<User> {
        let conn = self.db.get()?;
        find_user(&conn, "nickname", nickname)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", nickname)))
    }

    pub fn get_by_id(&self, id: &str) -> AppResult<User> {
        let conn = self.db.get()?;
        find_user(&conn, "id", id)?.ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    pub fn check_nickname_available(&self, raw: &str) -> AppResult<Availability> {
        let nickname = Nickname::parse(raw)?;
        self.is_unique("nickname", nickname.as_str())
    }

    pub fn check_email_available(&self, raw: &str) -> AppResult<Availability> {
        let email = validate_email(raw)?;
        self.is_unique("email", &email)
    }

    fn is_unique(&self, column: &'static str, value: &str) -> AppResult<Availability> {
        let conn = self.db.get()?;
        let taken: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?1)", column),
            params![value],
            |row| row.get(0),
        )?;
        Ok(Availability { is_unique: !taken })
    }

    /// Users whose nickname contains `fragment`, limited to `regions` when
    /// any are given. The caller is never included.
    pub fn search(
        &self,
        caller: &str,
        fragment: &str,
        regions: &[String],
    ) -> AppResult<Vec<UserSummary>> {
        let conn = self.db.get()?;

        let mut sql = String::from("SELECT id FROM users WHERE instr(nickname, ?1) > 0 AND id <> ?2");
        if !regions.is_empty() {
            let placeholders = (0..regions.len())
                .map(|i| format!("?{}", i + 3))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" AND region IN ({})", placeholders));
        }
        sql.push_str(&format!(" ORDER BY nickname LIMIT {}", SEARCH_LIMIT));

        let values = [fragment.trim(), caller]
            .into_iter()
            .chain(regions.iter().map(String::as_str));
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        self.summaries_in(&conn, caller, &ids)
    }

    /// Summaries for `ids` in the given order, with `isFollow` taken from the
    /// viewer's follow edges. Unknown ids are skipped.
    pub fn summaries(&self, viewer: &str, ids: &[String]) -> AppResult<Vec<UserSummary>> {
        let conn = self.db.get()?;
        self.summaries_in(&conn, viewer, ids)
    }

    fn summaries_in(
        &self,
        conn: &Connection,
        viewer: &str,
        ids: &[String],
    ) -> AppResult<Vec<UserSummary>> {
        let following = following_ids(conn, viewer)?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = stmt.query_row(params![id], User::from_row).optional()? {
                let is_follow = following.contains(&user.id);
                out.push(self.summary(user, is_follow));
            }
        }
        Ok(out)
    }

    /// Users the caller follows.
    pub fn following_list(&self, caller: &str) -> AppResult<Vec<UserSummary>> {
        let conn = self.db.get()?;
        let ids = ids_ordered_by_nickname(
            &conn,
            "SELECT u.id FROM follows f JOIN users u ON u.id = f.followee_id \
             WHERE f.follower_id = ?1 ORDER BY u.nickname",
            caller,
        )?;
        self.summaries_in(&conn, caller, &ids)
    }

    /// Users following the caller; `isFollow` says whether the caller
    /// follows them back.
    pub fn follower_list(&self, caller: &str) -> AppResult<Vec<UserSummary>> {
        let conn = self.db.get()?;
        let ids = ids_ordered_by_nickname(
            &conn,
            "SELECT u.id FROM follows f JOIN users u ON u.id = f.follower_id \
             WHERE f.followee_id = ?1 ORDER BY u.nickname",
            caller,
        )?;
        self.summaries_in(&conn, caller, &ids)
    }

    pub fn my_info(&self, caller: &str) -> AppResult<MyInfo> {
        let conn = self.db.get()?;
        let user = find_user(&conn, "id", caller)?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let count = |sql: &str| -> rusqlite::Result<i64> {
            conn.query_row(sql, params![caller], |row| row.get(0))
        };
        let follower = count("SELECT COUNT(*) FROM follows WHERE followee_id = ?1")?;
        let following = count("SELECT COUNT(*) FROM follows WHERE follower_id = ?1")?;
        let restaurant_count = count("SELECT COUNT(*) FROM user_restaurants WHERE user_id = ?1")?;

        Ok(MyInfo {
            profile_image: self.urls.resolve(&user.profile_image),
            nickname: user.nickname,
            region: user.region,
            follower,
            following,
            restaurant_count,
        })
    }

    pub fn my_detail(&self, caller: &str) -> AppResult<MyDetail> {
        let user = self.get_by_id(caller)?;
        Ok(MyDetail {
            profile_image: self.urls.resolve(&user.profile_image),
            email: user.email,
            nickname: user.nickname,
            provider: user.provider,
            region: user.region,
            birthdate: user.birthdate,
        })
    }

    /// Another user's page: profile, follow state and their restaurant list
    /// as seen by the caller.
    pub async fn target_info(&self, caller: &str, nickname: &str) -> AppResult<TargetUserInfo> {
        let (target, is_follow) = {
            let conn = self.db.get()?;
            let target = find_user(&conn, "nickname", nickname)?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", nickname)))?;
            let is_follow = is_following_in(&conn, caller, &target.id)?;
            (target, is_follow)
        };

        let restaurants = self
            .restaurants
            .visited(&target.id, caller, &ListQuery::default())
            .await?;

        Ok(TargetUserInfo {
            profile_image: self.urls.resolve(&target.profile_image),
            nickname: target.nickname,
            region: target.region,
            is_follow,
            restaurants,
        })
    }

    /// Apply a partial update. Unspecified fields keep their stored values;
    /// the password is re-hashed only when a new one was supplied.
    pub async fn update_profile(&self, caller: &str, update: ProfileUpdate) -> AppResult<MyDetail> {
        let existing = self.get_by_id(caller)?;

        let password_hash = match update.password.as_deref() {
            Some(plain) if !plain.is_empty() => Some(hash_password(plain, self.bcrypt_cost)?),
            _ => existing.password_hash,
        };

        let (profile_image, upload) = match update.image {
            ImageChange::Keep => (existing.profile_image, None),
            ImageChange::Reset => (DEFAULT_PROFILE_IMAGE.to_string(), None),
            ImageChange::Replace(data) => {
                let key = new_image_key(ImageKind::Profile);
                (key.clone(), Some((key, data)))
            }
        };

        let nickname = update
            .nickname
            .map(Nickname::into_inner)
            .unwrap_or(existing.nickname);
        let region = update.region.unwrap_or(existing.region);
        let birthdate = update
            .birthdate
            .map(BirthDate::into_inner)
            .or(existing.birthdate);

        {
            let mut conn = self.db.get()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_unique(&tx, &nickname, None, Some(caller))?;
            tx.execute(
                "UPDATE users SET nickname = ?1, region = ?2, birthdate = ?3, password_hash = ?4, profile_image = ?5
                 WHERE id = ?6",
                params![nickname, region, birthdate, password_hash, profile_image, caller],
            )
            .map_err(|e| conflict_on_duplicate(e, "User"))?;
            tx.commit()?;
        }

        if let Some((key, data)) = upload {
            upload_after_commit(self.images.as_ref(), &key, data).await;
        }

        tracing::info!(user_id = caller, "Profile updated");
        self.my_detail(caller)
    }

    /// Hard delete; follows, tokens, visits, wishes, reviews and likes cascade.
    pub fn delete_account(&self, caller: &str) -> AppResult<()> {
        let conn = self.db.get()?;
        let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![caller])?;
        if removed == 0 {
            return Err(AppError::NotFound("User not found".into()));
        }
        tracing::info!(user_id = caller, "Account deleted");
        Ok(())
    }

    fn summary(&self, user: User, is_follow: bool) -> UserSummary {
        UserSummary {
            profile_image: self.urls.resolve(&user.profile_image),
            nickname: user.nickname,
            region: user.region,
            is_follow,
        }
    }
}

fn find_user(conn: &Connection, column: &'static str, value: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
        params![value],
        User::from_row,
    )
    .optional()
}

fn ids_ordered_by_nickname(conn: &Connection, sql: &str, user: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params![user], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Fail with a Conflict naming the first unique field another account
/// already holds. Run inside the write's transaction so the check and the
/// write see the same rows.
fn ensure_unique(
    conn: &Connection,
    nickname: &str,
    email: Option<&str>,
    except: Option<&str>,
) -> AppResult<()> {
    let held_by_other = |column: &str, value: &str| -> rusqlite::Result<bool> {
        conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?1 AND id IS NOT ?2)",
                column
            ),
            params![value, except],
            |row| row.get(0),
        )
    };

    if held_by_other("nickname", nickname)? {
        return Err(AppError::Conflict("Nickname already exists".into()));
    }
    if let Some(email) = email {
        if held_by_other("email", email)? {
            return Err(AppError::Conflict("Email already exists".into()));
        }
    }
    Ok(())
}
