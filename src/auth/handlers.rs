use axum::extract::State;
use axum::Json;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::password::verify_password;
use crate::auth::tokens::{self, TokenPair};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/login — exchange email and password for a token pair
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<ApiResponse<TokenPair>> {
    let email = req.email.trim();

    let stored: Option<(String, Option<String>)> = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
    };

    // Social-provider accounts have no password and cannot log in here.
    let user_id = match stored {
        Some((id, Some(hash))) if verify_password(&req.password, &hash) => id,
        _ => {
            tracing::info!("Rejected login for {}", email);
            return Err(AppError::Unauthorized);
        }
    };

    let pair = tokens::issue_pair(&state.db, &user_id, &state.config.auth)?;
    Ok(ApiResponse::ok(pair))
}

/// POST /auth/refresh — trade a refresh token for a new pair
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<ApiResponse<TokenPair>> {
    let pair = tokens::refresh(&state.db, req.refresh_token.trim(), &state.config.auth)?;
    Ok(ApiResponse::ok(pair))
}

/// POST /auth/logout — revoke all of the caller's tokens
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    let revoked = tokens::revoke_all(&state.db, &user.id)?;
    tracing::info!(user_id = %user.id, revoked, "Logged out");
    Ok(ApiResponse::empty())
}
