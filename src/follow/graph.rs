use rand::Rng;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;

use super::recommend::{sample_recommendations, RECOMMENDATION_COUNT};
use crate::db::is_foreign_key_violation;
use crate::error::{conflict_on_duplicate, AppError, AppResult};
use crate::state::DbPool;

/// Directed follower → followee relation.
///
/// An edge's presence in `follows` is the only thing any `isFollow` flag is
/// derived from.
#[derive(Clone)]
pub struct FollowGraph {
    db: DbPool,
}

impl FollowGraph {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create the edge `follower → followee`.
    ///
    /// Following yourself is a validation error; following twice is a
    /// conflict the caller may choose to swallow.
    pub fn follow(&self, follower: &str, followee: &str) -> AppResult<()> {
        if follower == followee {
            return Err(AppError::Validation("Cannot follow yourself".into()));
        }

        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
            params![follower, followee],
        )
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("User not found".into())
            } else {
                conflict_on_duplicate(e, "Follow")
            }
        })?;

        tracing::debug!(follower, followee, "Follow edge created");
        Ok(())
    }

    /// Remove the edge if present. Returns whether anything was removed.
    pub fn unfollow(&self, follower: &str, followee: &str) -> AppResult<bool> {
        let conn = self.db.get()?;
        let removed = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower, followee],
        )?;
        Ok(removed > 0)
    }

    pub fn is_following(&self, follower: &str, followee: &str) -> AppResult<bool> {
        let conn = self.db.get()?;
        Ok(is_following_in(&conn, follower, followee)?)
    }

    /// Users following `user`.
    pub fn followers_of(&self, user: &str) -> AppResult<BTreeSet<String>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare("SELECT follower_id FROM follows WHERE followee_id = ?1")?;
        let ids = stmt
            .query_map(params![user], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        Ok(ids)
    }

    /// Users `user` follows.
    pub fn following_of(&self, user: &str) -> AppResult<BTreeSet<String>> {
        let conn = self.db.get()?;
        Ok(following_ids(&conn, user)?)
    }

    /// Up to two users the caller neither is nor follows, drawn at random.
    pub fn recommend(&self, caller: &str) -> AppResult<Vec<String>> {
        self.recommend_with(caller, &mut rand::thread_rng())
    }

    pub fn recommend_with<R: Rng + ?Sized>(
        &self,
        caller: &str,
        rng: &mut R,
    ) -> AppResult<Vec<String>> {
        let candidates = {
            let conn = self.db.get()?;
            candidate_ids(&conn, caller)?
        };
        Ok(sample_recommendations(
            &candidates,
            RECOMMENDATION_COUNT,
            rng,
        ))
    }
}

pub fn is_following_in(
    conn: &Connection,
    follower: &str,
    followee: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2)",
        params![follower, followee],
        |row| row.get(0),
    )
}

pub fn following_ids(conn: &Connection, user: &str) -> rusqlite::Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT followee_id FROM follows WHERE follower_id = ?1")?;
    let ids = stmt
        .query_map(params![user], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(ids)
}

/// All users minus the caller and everyone the caller follows.
pub fn candidate_ids(conn: &Connection, caller: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM users \
         WHERE id <> ?1 \
           AND id NOT IN (SELECT followee_id FROM follows WHERE follower_id = ?1) \
         ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![caller], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}
