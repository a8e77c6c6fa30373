use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::Database,
    extract::{Json, Path},
    ids::{RoomId, UserId},
    session::SessionContext,
    AppResult,
};

#[derive(Deserialize)]
pub(crate) struct MemberBody {
    user_id: UserId,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn add_user(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
    Json(MemberBody { user_id }): Json<MemberBody>,
) -> AppResult<Json<Value>> {
    db.rooms().add_member(&session, room_id, user_id).await?;
    Ok(Json(json!({ "info": "User successfully added to lobby" })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn remove_user(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
    Json(MemberBody { user_id }): Json<MemberBody>,
) -> AppResult<Json<Value>> {
    db.rooms().remove_member(&session, room_id, user_id).await?;
    Ok(Json(json!({ "info": "User successfully deleted from lobby" })))
}
