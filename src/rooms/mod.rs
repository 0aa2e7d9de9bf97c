mod msg;
mod new;
mod room;
mod store;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use msg::{ChatMessage, MessageStore, NewMessage};
pub use store::{Chatroom, ChatroomFields, RoomStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(room::list_rooms).post(new::new_room))
        .route("/{id}", get(room::room).put(room::update_room).delete(room::delete_room))
        .route("/{id}/active", get(room::room_active))
        .route("/{id}/messages", get(msg::list_messages).post(msg::create_message))
        .route("/{id}/ws", get(ws::room_ws))
}
