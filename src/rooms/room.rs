use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{appresult::JsonBody, relay::Registry, AppResult, RelayError};

use super::{Chatroom, ChatroomFields, RoomStore};

#[derive(Serialize)]
pub(crate) struct RoomView {
    #[serde(flatten)]
    room: Chatroom,
    active: bool,
}

impl RoomView {
    fn new(room: Chatroom, registry: &Registry) -> Self {
        let active = registry.has_activity(&room.id);
        Self { room, active }
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_rooms(
    State(rooms): State<RoomStore>,
    State(registry): State<Arc<Registry>>,
) -> AppResult<Json<Vec<RoomView>>> {
    Ok(Json(
        rooms
            .list()
            .await?
            .into_iter()
            .map(|room| RoomView::new(room, &registry))
            .collect()
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    Path(room_id): Path<String>,
    State(rooms): State<RoomStore>,
    State(registry): State<Arc<Registry>>,
) -> AppResult<Json<RoomView>> {
    let Some(room) = rooms.get(&room_id).await? else {
        return Err(RelayError::RoomNotFound(room_id))?;
    };

    Ok(Json(RoomView::new(room, &registry)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_room(
    Path(room_id): Path<String>,
    State(rooms): State<RoomStore>,
    JsonBody(fields): JsonBody<ChatroomFields>,
) -> AppResult<Json<Chatroom>> {
    let Some(room) = rooms.update(&room_id, fields).await? else {
        return Err(RelayError::RoomNotFound(room_id))?;
    };

    Ok(Json(room))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_room(
    Path(room_id): Path<String>,
    State(rooms): State<RoomStore>,
) -> AppResult<StatusCode> {
    if !rooms.delete(&room_id).await? {
        return Err(RelayError::RoomNotFound(room_id))?;
    }

    tracing::info!(room_id = %room_id, "chatroom deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_active(
    Path(room_id): Path<String>,
    State(registry): State<Arc<Registry>>,
) -> Json<Value> {
    Json(json!({ "active": registry.has_activity(&room_id) }))
}
