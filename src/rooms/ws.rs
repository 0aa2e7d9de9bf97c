use axum::{debug_handler, extract::{Path, State, WebSocketUpgrade}, response::{IntoResponse, Response}};
use futures_util::StreamExt;

use crate::{relay::{BroadcastEngine, RoomSession}, AppResult, RelayError};

use super::{MessageStore, RoomStore};

#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    Path(room_id): Path<String>,
    State(rooms): State<RoomStore>,
    State(messages): State<MessageStore>,
    State(engine): State<BroadcastEngine>,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    if !rooms.exists(&room_id).await? {
        return Err(RelayError::RoomNotFound(room_id))?;
    }

    let failed_room = room_id.clone();
    Ok(
        ws.on_failed_upgrade(move |err| tracing::warn!(room_id = %failed_room, error = %err, "websocket upgrade failed"))
            .on_upgrade(move |stream| async move {
                let (sender, receiver) = stream.split();
                RoomSession::new(engine, messages, room_id)
                    .run(sender, receiver)
                    .await;
            })
            .into_response()
    )
}
