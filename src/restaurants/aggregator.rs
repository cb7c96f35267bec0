use futures::stream::{self, StreamExt};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{ListQuery, RestaurantSummary, SortOrder};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::storage::{ImageUrlResolver, DEFAULT_REVIEW_IMAGE};

pub const RECOMMENDED_LIMIT: usize = 10;

/// Which reviews a row's `reviewCount` covers.
#[derive(Debug, Clone)]
pub enum ReviewScope {
    /// Reviews the list owner wrote on the restaurant
    Owner(String),
    /// Every review on the restaurant
    All,
}

/// A list row before enrichment.
#[derive(Debug, Clone)]
struct BaseRow {
    restaurant_id: i64,
    name: String,
    address: String,
    category: String,
    created_at: String,
    is_my: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Enrichment {
    review_count: i64,
    image_key: String,
}

impl Enrichment {
    fn fallback() -> Self {
        Self {
            review_count: 0,
            image_key: DEFAULT_REVIEW_IMAGE.to_string(),
        }
    }
}

/// Builds a user's visited and wish lists, enriching every row with its
/// review count and representative image.
#[derive(Clone)]
pub struct RestaurantListAggregator {
    db: DbPool,
    urls: ImageUrlResolver,
    workers: usize,
}

impl RestaurantListAggregator {
    pub fn new(db: DbPool, urls: ImageUrlResolver, workers: usize) -> Self {
        Self {
            db,
            urls,
            workers: workers.max(1),
        }
    }

    /// `owner`'s visited restaurants as seen by `viewer`. `isMy` marks rows
    /// the viewer has in their own list too.
    pub async fn visited(
        &self,
        owner: &str,
        viewer: &str,
        query: &ListQuery,
    ) -> AppResult<Vec<RestaurantSummary>> {
        let (owner, viewer, query) = (owner.to_string(), viewer.to_string(), query.clone());
        let scope = ReviewScope::Owner(owner.clone());
        let rows = self
            .blocking(move |conn| visited_rows(conn, &owner, &viewer, &query))
            .await?;
        Ok(self.enrich(rows, scope).await)
    }

    /// `owner`'s wish list. `isMy` marks wishes the owner has also visited.
    pub async fn wishes(&self, owner: &str, sort: SortOrder) -> AppResult<Vec<RestaurantSummary>> {
        let owner = owner.to_string();
        let rows = self
            .blocking(move |conn| wish_rows(conn, &owner, sort))
            .await?;
        Ok(self.enrich(rows, ReviewScope::All).await)
    }

    /// Restaurants in the caller's most-visited category, located in their
    /// region and not yet visited, most reviewed first. Empty until the caller
    /// has visited somewhere.
    pub async fn recommended(&self, caller: &str) -> AppResult<Vec<RestaurantSummary>> {
        let caller = caller.to_string();
        let rows = self
            .blocking(move |conn| recommended_rows(conn, &caller))
            .await?;
        Ok(self.enrich(rows, ReviewScope::All).await)
    }

    /// Run a closure on a pooled connection off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> AppResult<T> {
            let conn = db.get()?;
            Ok(f(&*conn)?)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?
    }

    /// Enrich rows concurrently, at most `workers` at a time, keeping the
    /// base order. A failing row falls back instead of failing the list.
    async fn enrich(&self, rows: Vec<BaseRow>, scope: ReviewScope) -> Vec<RestaurantSummary> {
        let enriched: Vec<(BaseRow, Enrichment)> = stream::iter(rows)
            .map(|row| {
                let scope = scope.clone();
                let restaurant_id = row.restaurant_id;
                async move {
                    let outcome = self
                        .blocking(move |conn| enrich_row(conn, restaurant_id, &scope))
                        .await;
                    (row, settle(restaurant_id, outcome))
                }
            })
            .buffered(self.workers)
            .collect()
            .await;

        enriched
            .into_iter()
            .map(|(row, enrichment)| RestaurantSummary {
                restaurant_id: row.restaurant_id,
                name: row.name,
                address: row.address,
                category: row.category,
                review_count: enrichment.review_count,
                review_image: self.urls.resolve(&enrichment.image_key),
                is_my: row.is_my,
                created_at: row.created_at,
            })
            .collect()
    }
}

fn settle(restaurant_id: i64, outcome: AppResult<Enrichment>) -> Enrichment {
    outcome.unwrap_or_else(|e| {
        tracing::warn!(
            restaurant_id,
            "Enrichment failed, using default image: {}",
            e
        );
        Enrichment::fallback()
    })
}

fn enrich_row(
    conn: &Connection,
    restaurant_id: i64,
    scope: &ReviewScope,
) -> rusqlite::Result<Enrichment> {
    let review_count = match scope {
        ReviewScope::Owner(owner) => conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE restaurant_id = ?1 AND user_id = ?2",
            params![restaurant_id, owner],
            |row| row.get(0),
        )?,
        ReviewScope::All => conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE restaurant_id = ?1",
            params![restaurant_id],
            |row| row.get(0),
        )?,
    };
    let image_key = representative_image_key(conn, restaurant_id)?;
    Ok(Enrichment {
        review_count,
        image_key,
    })
}

/// The image of the most-liked review on a restaurant that has one, lowest
/// review id first on ties; the default review image when none has one.
pub fn representative_image_key(conn: &Connection, restaurant_id: i64) -> rusqlite::Result<String> {
    let best: Option<String> = conn
        .query_row(
            "SELECT r.review_image FROM reviews r
             LEFT JOIN review_likes l ON l.review_id = r.id AND l.is_like = 1
             WHERE r.restaurant_id = ?1 AND r.review_image IS NOT NULL AND r.review_image <> ''
             GROUP BY r.id
             ORDER BY COUNT(l.review_id) DESC, r.id ASC
             LIMIT 1",
            params![restaurant_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(best.unwrap_or_else(|| DEFAULT_REVIEW_IMAGE.to_string()))
}

fn visited_rows(
    conn: &Connection,
    owner: &str,
    viewer: &str,
    query: &ListQuery,
) -> rusqlite::Result<Vec<BaseRow>> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let sql = format!(
        "SELECT r.id, r.name, r.address, r.category, list.created_at,
                EXISTS(SELECT 1 FROM user_restaurants mine
                       WHERE mine.user_id = ?2 AND mine.restaurant_id = r.id)
         FROM user_restaurants list
         JOIN restaurants r ON r.id = list.restaurant_id
         WHERE list.user_id = ?1 AND (?3 IS NULL OR instr(r.name, ?3) > 0)
         ORDER BY {}",
        query.sort.clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![owner, viewer, name], base_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn wish_rows(conn: &Connection, owner: &str, sort: SortOrder) -> rusqlite::Result<Vec<BaseRow>> {
    let sql = format!(
        "SELECT r.id, r.name, r.address, r.category, list.created_at,
                EXISTS(SELECT 1 FROM user_restaurants mine
                       WHERE mine.user_id = ?1 AND mine.restaurant_id = r.id)
         FROM wish_restaurants list
         JOIN restaurants r ON r.id = list.restaurant_id
         WHERE list.user_id = ?1
         ORDER BY {}",
        sort.clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![owner], base_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn recommended_rows(conn: &Connection, caller: &str) -> rusqlite::Result<Vec<BaseRow>> {
    let mut stmt = conn.prepare(
        "WITH favourite AS (
             SELECT r.category FROM user_restaurants ur
             JOIN restaurants r ON r.id = ur.restaurant_id
             WHERE ur.user_id = ?1
             GROUP BY r.category
             ORDER BY COUNT(*) DESC, r.category ASC
             LIMIT 1
         )
         SELECT r.id, r.name, r.address, r.category, r.created_at, 0
         FROM restaurants r
         JOIN users u ON u.id = ?1
         WHERE r.category = (SELECT category FROM favourite)
           AND instr(r.address, u.region) > 0
           AND r.id NOT IN (SELECT restaurant_id FROM user_restaurants WHERE user_id = ?1)
         ORDER BY (SELECT COUNT(*) FROM reviews v WHERE v.restaurant_id = r.id) DESC, r.id ASC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![caller, RECOMMENDED_LIMIT as i64], base_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn base_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BaseRow> {
    Ok(BaseRow {
        restaurant_id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        category: row.get(3)?,
        created_at: row.get(4)?,
        is_my: row.get(5)?,
    })
}
