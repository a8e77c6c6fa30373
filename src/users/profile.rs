use axum::{debug_handler, extract::State};
use serde_json::{json, Value};

use crate::{
    access::{self, Action, ResourceFacts},
    db::Database,
    extract::{Json, Path},
    ids::UserId,
    session::SessionContext,
    AppResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn hello(session: SessionContext) -> Json<Value> {
    Json(json!({ "info": format!("Hello {} !", session.nickname()) }))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn users(
    State(db): State<Database>,
    session: SessionContext,
) -> AppResult<Json<Vec<Value>>> {
    access::decide(&Action::ReadUserList, &session, &ResourceFacts::default()).into_result()?;

    let nicknames = db.credentials().list_nicknames().await?;
    Ok(Json(
        nicknames
            .into_iter()
            .map(|nickname| json!({ "nickname": nickname }))
            .collect(),
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn user(
    State(db): State<Database>,
    session: SessionContext,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<Value>> {
    access::decide(&Action::ReadUserList, &session, &ResourceFacts::default()).into_result()?;

    let nickname = db.credentials().nickname(user_id).await?;
    Ok(Json(json!({ "nickname": nickname })))
}
