pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{ffi, params};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_restaurants",
        include_str!("../../migrations/002_restaurants.sql"),
    ),
];

// Applied to every pooled connection; foreign_keys is per-connection in SQLite.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// UNIQUE or PRIMARY KEY violation: the row already exists.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    has_extended_code(err, ffi::SQLITE_CONSTRAINT_UNIQUE)
        || has_extended_code(err, ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

/// FOREIGN KEY violation: a referenced row does not exist.
pub fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    has_extended_code(err, ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn has_extended_code(err: &rusqlite::Error, code: std::os::raw::c_int) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == code)
}

/// Single-connection in-memory pool with the full schema applied.
///
/// In-memory databases are private to a connection, so the pool must never
/// grow past one.
#[cfg(test)]
pub fn memory_pool() -> DbPool {
    let manager =
        SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
pub mod fixtures {
    use rusqlite::{params, Connection};

    pub fn insert_user(conn: &Connection, nickname: &str, region: &str) -> String {
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO users (id, email, nickname, region, profile_image)
             VALUES (?1, ?2, ?3, ?4, 'profile/images/defaultprofile.png')",
            params![id, format!("{}@example.com", nickname), nickname, region],
        )
        .unwrap();
        id
    }

    pub fn insert_restaurant(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO restaurants (name, address, category) VALUES (?1, 'Somewhere 1', 'korean')",
            params![name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn insert_review(
        conn: &Connection,
        user_id: &str,
        restaurant_id: i64,
        image: Option<&str>,
    ) -> i64 {
        conn.execute(
            "INSERT INTO reviews (user_id, restaurant_id, taste, service, restroom_cleanliness, review_image)
             VALUES (?1, ?2, 3, 3, 3, ?3)",
            params![user_id, restaurant_id, image],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn like(conn: &Connection, review_id: i64, user_id: &str) {
        conn.execute(
            "INSERT INTO review_likes (review_id, user_id, is_like) VALUES (?1, ?2, 1)",
            params![review_id, user_id],
        )
        .unwrap();
    }

    pub fn visit(conn: &Connection, user_id: &str, restaurant_id: i64, review_id: Option<i64>) {
        conn.execute(
            "INSERT INTO user_restaurants (user_id, restaurant_id, review_id) VALUES (?1, ?2, ?3)",
            params![user_id, restaurant_id, review_id],
        )
        .unwrap();
    }
}
