use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::users::UserSummary;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/followers", get(followers))
        .route("/users/me/following", get(following))
        .route("/users/recommendations", get(recommendations))
        .route("/users/{nickname}/follow", post(follow).delete(unfollow))
}

async fn followers(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    Ok(ApiResponse::ok(state.users.follower_list(&user.id)?))
}

async fn following(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    Ok(ApiResponse::ok(state.users.following_list(&user.id)?))
}

async fn recommendations(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let picked = state.follows.recommend(&user.id)?;
    Ok(ApiResponse::ok(state.users.summaries(&user.id, &picked)?))
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(nickname): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let target = state.users.get_by_nickname(&nickname)?;
    state.follows.follow(&user.id, &target.id)?;
    tracing::info!(follower = %user.nickname, followee = %target.nickname, "Followed");
    Ok(ApiResponse::empty())
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(nickname): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let target = state.users.get_by_nickname(&nickname)?;
    state.follows.unfollow(&user.id, &target.id)?;
    Ok(ApiResponse::empty())
}
