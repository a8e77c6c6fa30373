use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{db::Database, extract::Json, AppResult};

#[derive(Deserialize)]
pub(crate) struct RegisterBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    password: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn register(
    State(db): State<Database>,
    Json(RegisterBody { email, nickname, password }): Json<RegisterBody>,
) -> AppResult<Json<Value>> {
    let id = db.credentials().register(&email, &nickname, &password).await?;
    Ok(Json(json!({ "info": "User successfully created", "id": id })))
}
