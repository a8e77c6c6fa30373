pub mod access;
pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod extract;
pub mod ids;
pub mod logging;
pub mod rooms;
pub mod session;
pub mod shutdown;
pub mod users;

#[cfg(test)]
mod testing;

use axum::{debug_handler, extract::FromRef, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult, ErrorKind};

use crate::auth::TokenService;
use crate::db::Database;
use crate::extract::Json;

/// Handles shared by every request; built once in `main`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: Database,
    pub tokens: TokenService,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .merge(auth::router())
        .merge(users::router())
        .merge(rooms::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[debug_handler]
async fn hello() -> Json<Value> {
    Json(json!({ "info": "Hello " }))
}
