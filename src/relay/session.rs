use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::{error::BoxError, rooms::{MessageStore, NewMessage}, RelayError, RelayResult};

use super::{BroadcastEngine, ConnectionId, Membership};

/// Drives one client connection for its whole life in a room: join,
/// backlog replay, relaying inbound frames, and leaving on every exit path.
pub struct RoomSession {
    engine: BroadcastEngine,
    messages: MessageStore,
    room_id: String,
}

impl RoomSession {
    pub fn new(engine: BroadcastEngine, messages: MessageStore, room_id: String) -> Self {
        Self { engine, messages, room_id }
    }

    pub async fn run<Si, St, E>(self, mut sink: Si, mut stream: St)
    where
        Si: Sink<Message> + Unpin + Send + 'static,
        Si::Error: Into<BoxError>,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: Into<BoxError>,
    {
        let registry = Arc::clone(self.engine.registry());
        let (handle, outbound) = registry.connection();
        let membership = Membership::join(registry, &self.room_id, handle);
        let connection = membership.id();
        tracing::info!(room_id = %self.room_id, %connection, "session joined");

        match self.replay_backlog(&mut sink).await {
            Ok(replayed) => tracing::debug!(room_id = %self.room_id, %connection, replayed, "backlog sent"),
            Err(err) => {
                tracing::warn!(room_id = %self.room_id, %connection, error = %err, "backlog replay failed");
                return;
            }
        }

        let mut writer = tokio::spawn(forward(outbound, sink, connection));

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.inbound(text.as_str().as_bytes(), connection).await,
                    Some(Ok(Message::Binary(data))) => self.inbound(&data, connection).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let err = RelayError::TransportReadFailure(err.into());
                        tracing::warn!(room_id = %self.room_id, %connection, error = %err, "closing session");
                        break;
                    }
                },
                _ = &mut writer => break,
            }
        }

        writer.abort();
        drop(membership);
        tracing::info!(room_id = %self.room_id, %connection, "session closed");
    }

    /// Writes the room's history straight to the socket, oldest first. A
    /// store failure only skips the replay; a socket failure ends the session.
    async fn replay_backlog<Si>(&self, sink: &mut Si) -> RelayResult<usize>
    where
        Si: Sink<Message> + Unpin,
        Si::Error: Into<BoxError>,
    {
        let backlog = match self.messages.list_by_room(&self.room_id).await {
            Ok(backlog) => backlog,
            Err(err) => {
                tracing::warn!(room_id = %self.room_id, error = %err, "could not load backlog");
                return Ok(0);
            }
        };

        for msg in &backlog {
            let frame = Message::Text(serde_json::to_string(msg)?.into());
            sink.send(frame)
                .await
                .map_err(|err| RelayError::TransportWriteFailure(err.into()))?;
        }
        Ok(backlog.len())
    }

    async fn inbound(&self, data: &[u8], connection: ConnectionId) {
        let msg: NewMessage = match serde_json::from_slice(data) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(room_id = %self.room_id, %connection, error = %err, "ignoring malformed frame");
                return;
            }
        };

        if let Err(err) = self.engine.publish(&self.room_id, msg).await {
            tracing::warn!(room_id = %self.room_id, %connection, error = %err, "publish failed");
        }
    }
}

/// Drains the connection's outbound queue onto the socket until a write fails.
async fn forward<Si>(mut outbound: mpsc::Receiver<Utf8Bytes>, mut sink: Si, connection: ConnectionId)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Into<BoxError>,
{
    while let Some(frame) = outbound.recv().await {
        if let Err(err) = sink.send(Message::Text(frame)).await {
            let err = RelayError::TransportWriteFailure(err.into());
            tracing::warn!(%connection, error = %err, "closing session");
            break;
        }
    }
}
