use std::sync::Arc;

use crate::{rooms::{ChatMessage, MessageStore, NewMessage, RoomStore}, RelayError, RelayResult};

use super::Registry;

/// Persist-then-fan-out for messages entering a room.
#[derive(Clone)]
pub struct BroadcastEngine {
    registry: Arc<Registry>,
    rooms: RoomStore,
    messages: MessageStore,
}

impl BroadcastEngine {
    pub fn new(registry: Arc<Registry>, rooms: RoomStore, messages: MessageStore) -> Self {
        Self { registry, rooms, messages }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stores `msg` in `room_id` and pushes it to everyone in the room.
    ///
    /// Nothing is broadcast unless the append succeeded. Once stored the
    /// publish counts as done: per-connection delivery failures stay in the
    /// registry's log.
    pub async fn publish(&self, room_id: &str, msg: NewMessage) -> RelayResult<ChatMessage> {
        if !self.rooms.exists(room_id).await? {
            return Err(RelayError::RoomNotFound(room_id.to_owned()));
        }

        self.registry.touch(room_id);

        let msg = self
            .messages
            .append(room_id, msg)
            .await
            .map_err(RelayError::PersistFailure)?;

        match self.registry.broadcast(room_id, &msg).await {
            Ok(delivered) => tracing::debug!(room_id, message_id = %msg.id, delivered, "published"),
            Err(err) => tracing::warn!(room_id, message_id = %msg.id, error = %err, "stored message was not broadcast"),
        }

        Ok(msg)
    }
}
