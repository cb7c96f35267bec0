use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use super::form::MultipartForm;
use crate::auth::tokens::{self, TokenPair};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::users::{
    validate_email, validate_region, Availability, BirthDate, ImageChange, MyDetail, MyInfo,
    NewUser, Nickname, ProfileUpdate, Provider, TargetUserInfo, UserSummary,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(signup))
        .route("/users/nickname-availability", get(nickname_availability))
        .route("/users/email-availability", get(email_availability))
        .route(
            "/users/me",
            get(my_info).put(update_profile).delete(delete_account),
        )
        .route("/users/me/detail", get(my_detail))
        .route("/users/search", get(search))
        .route("/users/{nickname}", get(target_info))
}

#[derive(Deserialize)]
pub struct ValueQuery {
    #[serde(default)]
    pub value: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub nickname: String,
    /// Comma-separated region names.
    pub region: Option<String>,
}

impl SearchQuery {
    fn regions(&self) -> Vec<String> {
        self.region
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// --- Handlers ---

async fn signup(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<TokenPair>> {
    let mut form = MultipartForm::read(multipart).await?;

    let new_user = NewUser {
        email: validate_email(form.require("email")?)?,
        password: form.text("password").map(str::to_string),
        nickname: Nickname::parse(form.require("nickName")?)?,
        provider: Provider::parse(form.text("provider").unwrap_or_default())?,
        region: validate_region(form.require("region")?)?,
        birthdate: form.text("birthdate").map(BirthDate::parse).transpose()?,
    };
    let image = form.take_file("profileImage");

    let user_id = state.users.signup(new_user, image).await?;
    let pair = tokens::issue_pair(&state.db, &user_id, &state.config.auth)?;
    Ok(ApiResponse::created(pair))
}

async fn nickname_availability(
    State(state): State<AppState>,
    Query(query): Query<ValueQuery>,
) -> AppResult<ApiResponse<Availability>> {
    Ok(ApiResponse::ok(
        state.users.check_nickname_available(&query.value)?,
    ))
}

async fn email_availability(
    State(state): State<AppState>,
    Query(query): Query<ValueQuery>,
) -> AppResult<ApiResponse<Availability>> {
    Ok(ApiResponse::ok(state.users.check_email_available(&query.value)?))
}

async fn my_info(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<MyInfo>> {
    Ok(ApiResponse::ok(state.users.my_info(&user.id)?))
}

async fn my_detail(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<MyDetail>> {
    Ok(ApiResponse::ok(state.users.my_detail(&user.id)?))
}

/// PUT /users/me — fields left out of the form keep their stored values.
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<ApiResponse<MyDetail>> {
    let mut form = MultipartForm::read(multipart).await?;

    let image = if form.flag("isImageChanged")? {
        match form.take_file("profileImage") {
            Some(data) => ImageChange::Replace(data),
            None => ImageChange::Reset,
        }
    } else {
        ImageChange::Keep
    };

    let update = ProfileUpdate {
        nickname: form.text("nickName").map(Nickname::parse).transpose()?,
        region: form.text("region").map(validate_region).transpose()?,
        birthdate: form.text("birthdate").map(BirthDate::parse).transpose()?,
        password: form.text("password").map(str::to_string),
        image,
    };

    let detail = state.users.update_profile(&user.id, update).await?;
    Ok(ApiResponse::ok(detail))
}

async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<ApiResponse<()>> {
    state.users.delete_account(&user.id)?;
    Ok(ApiResponse::empty())
}

async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let found = state
        .users
        .search(&user.id, &query.nickname, &query.regions())?;
    Ok(ApiResponse::ok(found))
}

async fn target_info(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(nickname): Path<String>,
) -> AppResult<ApiResponse<TargetUserInfo>> {
    Ok(ApiResponse::ok(
        state.users.target_info(&user.id, &nickname).await?,
    ))
}
