use axum::{debug_handler, extract::State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db::Database,
    extract::{Json, Path},
    ids::{MessageId, RoomId},
    session::SessionContext,
    AppResult,
};

use super::Message;

#[derive(Deserialize)]
pub(crate) struct SendMessageBody {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
pub(crate) struct EditMessageBody {
    message_id: MessageId,
    #[serde(default)]
    text: String,
}

/// The author is always the caller, whatever the body claims.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_msg(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
    Json(SendMessageBody { text }): Json<SendMessageBody>,
) -> AppResult<Json<Value>> {
    let id = db.messages().post(&session, room_id, &text).await?;
    Ok(Json(json!({ "info": "Text successfully sent", "id": id })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn edit_msg(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
    Json(EditMessageBody { message_id, text }): Json<EditMessageBody>,
) -> AppResult<Json<Value>> {
    db.messages().edit(&session, room_id, message_id, &text).await?;
    Ok(Json(json!({ "info": "Message has been edited !" })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn messages(
    State(db): State<Database>,
    session: SessionContext,
    Path(room_id): Path<RoomId>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(db.messages().list_by_room(&session, room_id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn message(
    State(db): State<Database>,
    session: SessionContext,
    Path((room_id, message_id)): Path<(RoomId, MessageId)>,
) -> AppResult<Json<Message>> {
    Ok(Json(db.messages().get(&session, room_id, message_id).await?))
}
