use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::Database,
    extract::{Json, Path},
    ids::RoomId,
    session::SessionContext,
    AppResult,
};

use super::Room;

#[derive(Deserialize)]
pub(crate) struct NewRoomBody {
    #[serde(default)]
    lobby_name: String,
}

#[derive(Deserialize)]
pub(crate) struct DeleteRoomBody {
    lobby_id: RoomId,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn rooms(
    State(db): State<Database>,
    session: SessionContext,
) -> AppResult<Json<Vec<Room>>> {
    Ok(Json(db.rooms().list_rooms(&session).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
) -> AppResult<Json<Room>> {
    Ok(Json(db.rooms().get_room(&session, room_id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(db): State<Database>,
    session: SessionContext,
    Json(NewRoomBody { lobby_name }): Json<NewRoomBody>,
) -> AppResult<Json<Value>> {
    let id = db.rooms().create_room(&session, &lobby_name).await?;
    Ok(Json(json!({ "info": "New lobby created", "id": id })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_room(
    State(db): State<Database>,
    session: SessionContext,
    Json(DeleteRoomBody { lobby_id }): Json<DeleteRoomBody>,
) -> AppResult<Json<Value>> {
    db.rooms().delete_room(&session, lobby_id).await?;
    Ok(Json(json!({ "info": "Lobby successfully deleted" })))
}
