mod profile;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/hello", get(profile::hello))
        .route("/api/users", get(profile::users))
        .route("/api/users/{user_id}", get(profile::user))
}
