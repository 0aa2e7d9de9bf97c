use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{appresult::JsonBody, relay::BroadcastEngine, AppResult, RelayError};

use super::RoomStore;

/// One chat line, exactly as it crosses the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub chatroom_id: String,
    pub nickname: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Client-supplied message. Server-owned fields (`id`, `chatroom_id`,
/// timestamps) are ignored on the way in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub content: String,
}

impl NewMessage {
    pub fn new(nickname: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone)]
pub struct MessageStore {
    db_pool: SqlitePool,
}

impl MessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Persists `msg` into `chatroom_id` under a fresh id and timestamps.
    pub async fn append(&self, chatroom_id: &str, NewMessage { nickname, content }: NewMessage) -> Result<ChatMessage, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let msg = ChatMessage {
            id: Uuid::now_v7().to_string(),
            chatroom_id: chatroom_id.to_owned(),
            nickname,
            content,
            created_at: now,
            updated_at: now,
        };

        sqlx::query("INSERT INTO messages (id,chatroom_id,nickname,content,created_at,updated_at) VALUES (?,?,?,?,?,?)")
            .bind(&msg.id)
            .bind(&msg.chatroom_id)
            .bind(&msg.nickname)
            .bind(&msg.content)
            .bind(msg.created_at)
            .bind(msg.updated_at)
            .execute(&self.db_pool)
            .await?;

        Ok(msg)
    }

    /// Backlog for a room, oldest first.
    pub async fn list_by_room(&self, chatroom_id: &str) -> Result<Vec<ChatMessage>, sqlx::Error> {
        sqlx::query_as("SELECT id,chatroom_id,nickname,content,created_at,updated_at FROM messages WHERE chatroom_id=? ORDER BY rowid")
            .bind(chatroom_id)
            .fetch_all(&self.db_pool)
            .await
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_message(
    Path(room_id): Path<String>,
    State(engine): State<BroadcastEngine>,
    JsonBody(msg): JsonBody<NewMessage>,
) -> AppResult<impl IntoResponse> {
    let msg = engine.publish(&room_id, msg).await?;
    Ok((StatusCode::CREATED, Json(msg)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_messages(
    Path(room_id): Path<String>,
    State(rooms): State<RoomStore>,
    State(messages): State<MessageStore>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    if !rooms.exists(&room_id).await? {
        return Err(RelayError::RoomNotFound(room_id))?;
    }

    Ok(Json(messages.list_by_room(&room_id).await?))
}
