use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chatroom {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatroomFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Room metadata: the only authority on whether a room id exists.
#[derive(Clone)]
pub struct RoomStore {
    db_pool: SqlitePool,
}

impl RoomStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub async fn create(&self, ChatroomFields { name, description }: ChatroomFields) -> Result<Chatroom, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let room = Chatroom {
            id: Uuid::now_v7().to_string(),
            name,
            description,
            created_at: now,
            updated_at: now,
        };

        sqlx::query("INSERT INTO rooms (id,name,description,created_at,updated_at) VALUES (?,?,?,?,?)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(&room.description)
            .bind(room.created_at)
            .bind(room.updated_at)
            .execute(&self.db_pool)
            .await?;

        Ok(room)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Chatroom>, sqlx::Error> {
        sqlx::query_as("SELECT id,name,description,created_at,updated_at FROM rooms WHERE id=?")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        Ok(
            sqlx::query("SELECT 1 FROM rooms WHERE id=?")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
                .is_some()
        )
    }

    pub async fn list(&self) -> Result<Vec<Chatroom>, sqlx::Error> {
        sqlx::query_as("SELECT id,name,description,created_at,updated_at FROM rooms ORDER BY created_at, id")
            .fetch_all(&self.db_pool)
            .await
    }

    /// Returns `None` when no room has this id.
    pub async fn update(&self, id: &str, ChatroomFields { name, description }: ChatroomFields) -> Result<Option<Chatroom>, sqlx::Error> {
        let updated = sqlx::query("UPDATE rooms SET name=?, description=?, updated_at=? WHERE id=?")
            .bind(&name)
            .bind(&description)
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    /// Deletes the room and its message history. Returns `false` when nothing was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.db_pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM rooms WHERE id=?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM messages WHERE chatroom_id=?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn fields(name: &str) -> ChatroomFields {
        ChatroomFields { name: name.to_owned(), description: String::new() }
    }

    #[tokio::test]
    async fn create_then_get() {
        let rooms = RoomStore::new(db::memory().await);
        let room = rooms.create(fields("lobby")).await.unwrap();

        assert!(!room.id.is_empty());
        assert!(rooms.exists(&room.id).await.unwrap());
        assert_eq!(rooms.get(&room.id).await.unwrap().unwrap().name, "lobby");
    }

    #[tokio::test]
    async fn missing_room_does_not_exist() {
        let rooms = RoomStore::new(db::memory().await);
        assert!(!rooms.exists("nope").await.unwrap());
        assert!(rooms.get("nope").await.unwrap().is_none());
        assert!(rooms.update("nope", fields("x")).await.unwrap().is_none());
        assert!(!rooms.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let rooms = RoomStore::new(db::memory().await);
        let created = rooms.create(fields("old")).await.unwrap();
        let room = rooms.get(&created.id).await.unwrap().unwrap();

        let updated = rooms
            .update(&room.id, ChatroomFields { name: "new".to_owned(), description: "d".to_owned() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "new");
        assert_eq!(updated.description, "d");
        assert_eq!(updated.created_at, room.created_at);
        assert!(updated.updated_at >= room.updated_at);

        assert!(rooms.delete(&room.id).await.unwrap());
        assert!(!rooms.exists(&room.id).await.unwrap());
        assert!(rooms.list().await.unwrap().is_empty());
    }
}
