use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a fresh access/refresh pair for a user.
pub fn issue_pair(pool: &DbPool, user_id: &str, config: &AuthConfig) -> AppResult<TokenPair> {
    let conn = pool.get()?;
    let pair = TokenPair {
        access_token: insert_token(
            &conn,
            user_id,
            TokenKind::Access,
            config.access_token_hours,
        )?,
        refresh_token: insert_token(
            &conn,
            user_id,
            TokenKind::Refresh,
            config.refresh_token_hours,
        )?,
    };
    tracing::debug!(user_id, "Issued token pair");
    Ok(pair)
}

/// Resolve an unexpired access token to its user.
pub fn resolve(pool: &DbPool, token: &str) -> AppResult<Option<CurrentUser>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.nickname FROM auth_tokens t \
             JOIN users u ON u.id = t.user_id \
             WHERE t.token = ?1 AND t.kind = 'access' AND t.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    nickname: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Consume a refresh token and issue a new pair.
pub fn refresh(pool: &DbPool, refresh_token: &str, config: &AuthConfig) -> AppResult<TokenPair> {
    let user_id: Option<String> = {
        let conn = pool.get()?;
        conn.query_row(
            "DELETE FROM auth_tokens \
             WHERE token = ?1 AND kind = 'refresh' AND expires_at > datetime('now') \
             RETURNING user_id",
            params![refresh_token],
            |row| row.get(0),
        )
        .optional()?
    };

    let user_id = user_id.ok_or(AppError::Unauthorized)?;
    issue_pair(pool, &user_id, config)
}

/// Revoke every token a user holds.
pub fn revoke_all(pool: &DbPool, user_id: &str) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM auth_tokens WHERE user_id = ?1",
        params![user_id],
    )?;
    Ok(removed)
}

fn insert_token(
    conn: &Connection,
    user_id: &str,
    kind: TokenKind,
    hours: u64,
) -> rusqlite::Result<String> {
    let token = generate_token();
    conn.execute(
        "INSERT INTO auth_tokens (token, user_id, kind, expires_at) \
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![token, user_id, kind.as_str(), format!("+{} hours", hours)],
    )?;
    Ok(token)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
