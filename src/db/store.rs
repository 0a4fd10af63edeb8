use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::models::CHAT_HISTORY_LIMIT;

// Global database instance
static DB: OnceCell<Arc<RoomStore>> = OnceCell::const_new();

/// Initialize the global store connection
pub async fn init_db(database_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = RoomStore::new(database_url).await?;
    DB.set(Arc::new(store))
        .map_err(|_| "Store already initialized")?;
    Ok(())
}

/// Get the global store instance, if one was initialized. Callers treat
/// `None` as "run in memory only".
pub fn get_db() -> Option<Arc<RoomStore>> {
    DB.get().cloned()
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRow {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Durable state of a previously known room.
#[derive(Debug, Clone)]
pub struct StoredRoom {
    pub files: Vec<FileRow>,
    /// Most recent messages, oldest first, capped at the chat buffer size.
    pub messages: Vec<MessageRow>,
}

/// Postgres-backed room/file/chat store. All hub access is best-effort: a
/// failure here never fails the in-memory session.
pub struct RoomStore {
    pool: PgPool,
}

impl RoomStore {
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;

        info!("Database connection pool created successfully");
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS room_files (
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                path TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (room_id, path)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS room_messages (
                id BIGSERIAL PRIMARY KEY,
                room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                username TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load a room's durable state. `Ok(None)` means the room was never
    /// persisted, which is how new rooms look; it is not an error.
    pub async fn load_room(&self, room_id: &str) -> Result<Option<StoredRoom>, SqlxError> {
        let known: Option<(String,)> = sqlx::query_as("SELECT id FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Ok(None);
        }

        let files: Vec<FileRow> =
            sqlx::query_as("SELECT path, content FROM room_files WHERE room_id = $1")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?;

        let mut messages: Vec<MessageRow> = sqlx::query_as(
            "SELECT username, content, created_at FROM room_messages
             WHERE room_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(room_id)
        .bind(CHAT_HISTORY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        // Chronological order for the chat buffer
        messages.reverse();

        Ok(Some(StoredRoom { files, messages }))
    }

    pub async fn create_room(&self, room_id: &str) -> Result<(), SqlxError> {
        sqlx::query("INSERT INTO rooms (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn save_file(&self, room_id: &str, path: &str, content: &str) -> Result<(), SqlxError> {
        self.create_room(room_id).await?;
        sqlx::query(
            "INSERT INTO room_files (room_id, path, content) VALUES ($1, $2, $3)
             ON CONFLICT (room_id, path)
             DO UPDATE SET content = EXCLUDED.content, updated_at = NOW()",
        )
        .bind(room_id)
        .bind(path)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn rename_file(&self, room_id: &str, old_path: &str, new_path: &str) -> Result<(), SqlxError> {
        sqlx::query(
            "UPDATE room_files SET path = $3, updated_at = NOW()
             WHERE room_id = $1 AND path = $2",
        )
        .bind(room_id)
        .bind(old_path)
        .bind(new_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_file(&self, room_id: &str, path: &str) -> Result<(), SqlxError> {
        sqlx::query("DELETE FROM room_files WHERE room_id = $1 AND path = $2")
            .bind(room_id)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_message(
        &self,
        room_id: &str,
        username: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), SqlxError> {
        self.create_room(room_id).await?;
        sqlx::query(
            "INSERT INTO room_messages (room_id, username, content, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(room_id)
        .bind(username)
        .bind(content)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
