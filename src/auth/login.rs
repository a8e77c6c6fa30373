use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{db::Database, extract::Json, AppResult};

use super::TokenService;

#[derive(Deserialize)]
pub(crate) struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db): State<Database>,
    State(tokens): State<TokenService>,
    Json(LoginBody { email, password }): Json<LoginBody>,
) -> AppResult<Json<Value>> {
    let claims = db
        .credentials()
        .authenticate(&email, &password, tokens.lifetime())
        .await?;
    let token = tokens.issue(&claims)?;

    tracing::info!(user_id = %claims.user_id, "logged in");
    Ok(Json(json!({ "token": token })))
}
