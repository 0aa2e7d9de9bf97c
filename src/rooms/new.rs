use axum::{debug_handler, extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{appresult::JsonBody, AppResult};

use super::{ChatroomFields, RoomStore};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(rooms): State<RoomStore>,
    JsonBody(fields): JsonBody<ChatroomFields>,
) -> AppResult<impl IntoResponse> {
    let room = rooms.create(fields).await?;
    tracing::info!(room_id = %room.id, name = %room.name, "chatroom created");

    Ok((StatusCode::CREATED, Json(room)))
}
