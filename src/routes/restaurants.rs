use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::form::MultipartForm;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::response::ApiResponse;
use crate::restaurants::{ListQuery, NewReview, PostedReview, RestaurantSummary, SortOrder, WishState};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/restaurants", get(my_restaurants))
        .route(
            "/users/me/restaurants/{id}",
            post(add_visit).delete(remove_visit),
        )
        .route("/users/me/restaurants/wish", get(my_wishes))
        .route("/users/me/recommended-restaurants", get(recommended))
        .route(
            "/users/me/restaurants/wish/{id}",
            get(wish_state).post(add_wish).delete(remove_wish),
        )
        .route("/reviews/{id}/like", post(like_review).delete(unlike_review))
}

#[derive(Deserialize)]
pub struct SortQuery {
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub is_like: bool,
}

async fn my_restaurants(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Vec<RestaurantSummary>>> {
    let list = state.restaurants.visited(&user.id, &user.id, &query).await?;
    Ok(ApiResponse::ok(list))
}

async fn my_wishes(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SortQuery>,
) -> AppResult<ApiResponse<Vec<RestaurantSummary>>> {
    let list = state.restaurants.wishes(&user.id, query.sort).await?;
    Ok(ApiResponse::ok(list))
}

/// GET /users/me/recommended-restaurants — unvisited picks in the caller's
/// favourite category and region
async fn recommended(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<Vec<RestaurantSummary>>> {
    let list = state.restaurants.recommended(&user.id).await?;
    Ok(ApiResponse::ok(list))
}

/// POST /users/me/restaurants/{id} — record a visit with its review
async fn add_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PostedReview>> {
    let mut form = MultipartForm::read(multipart).await?;
    let review = NewReview {
        is_car_visit: form.flag("isCarVisit")?,
        car_visit_ability: form.parse("carVisitAbility")?,
        taste: form.parse_required("taste")?,
        service: form.parse_required("service")?,
        restroom_cleanliness: form.parse_required("restroomCleanliness")?,
        overall_experience: form.text("overallExperience").unwrap_or_default().to_string(),
    };
    let image = form.take_file("reviewImage");

    let stored = state
        .visits
        .add_visit(&user.id, restaurant_id, review, image)
        .await?;
    Ok(ApiResponse::created(stored))
}

async fn remove_visit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    state.visits.remove_visit(&user.id, restaurant_id)?;
    Ok(ApiResponse::empty())
}

async fn wish_state(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
) -> AppResult<ApiResponse<WishState>> {
    Ok(ApiResponse::ok(state.visits.is_wish(&user.id, restaurant_id)?))
}

async fn add_wish(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    state.visits.add_wish(&user.id, restaurant_id)?;
    Ok(ApiResponse::empty())
}

async fn remove_wish(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(restaurant_id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    state.visits.remove_wish(&user.id, restaurant_id)?;
    Ok(ApiResponse::empty())
}

async fn like_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(review_id): Path<i64>,
    Json(req): Json<LikeRequest>,
) -> AppResult<ApiResponse<()>> {
    state.visits.like_review(&user.id, review_id, req.is_like)?;
    Ok(ApiResponse::empty())
}

async fn unlike_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(review_id): Path<i64>,
) -> AppResult<ApiResponse<()>> {
    state.visits.unlike_review(&user.id, review_id)?;
    Ok(ApiResponse::empty())
}
