pub mod auth;
pub mod follows;
pub mod form;
pub mod images;
pub mod restaurants;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.storage.max_upload_bytes;

    Router::new()
        .merge(users::router())
        .merge(follows::router())
        .merge(restaurants::router())
        .merge(auth::router())
        .merge(images::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
