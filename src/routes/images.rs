use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/images/{*key}", get(serve))
}

/// GET /images/{*key} — stream a stored image back with a guessed content type
async fn serve(State(state): State<AppState>, Path(key): Path<String>) -> AppResult<Response> {
    let data = state
        .images
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image {} not found", key)))?;

    let mime = mime_guess::from_path(&key).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}
