mod ledger;
mod members;
mod msg;
mod registry;
mod room;

use axum::{
    routing::{delete, get, post},
    Router,
};

pub use ledger::{Message, MessageLedger};
pub use registry::{MembershipRegistry, Room};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lobby", get(room::rooms).post(room::new_room).delete(room::delete_room))
        .route("/api/lobby/{lobby_id}", get(room::room).post(msg::send_msg).patch(msg::edit_msg))
        .route("/api/lobby/{lobby_id}/messages", get(msg::messages))
        .route("/api/lobby/{lobby_id}/messages/{message_id}", get(msg::message))
        .route("/api/lobby/{lobby_id}/add-user", post(members::add_user))
        .route("/api/lobby/{lobby_id}/remove-user", delete(members::remove_user))
}
