use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use crate::models::{Conversation, Message, Model};
use serde::Deserialize;

// Define the database schema using CREATE TABLE IF NOT EXISTS statements
const MIGRATIONS_SQL: &str = "
-- Key-Value Table
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const SELECTED_MODEL_KEY: &str = "selectedModel";

pub fn messages_key(conversation_id: &str) -> String {
    format!("messages_{}", conversation_id)
}

/// String-keyed storage scoped to one client.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, key: &str, value: &str) -> Result<(), anyhow::Error>;
    async fn remove(&self, key: &str) -> Result<(), anyhow::Error>;
}

// --- SQLite Store ---

#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `db_path` and runs migrations.
    pub async fn open(db_path: &Path) -> Result<Self, anyhow::Error> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.context("Failed to create database directory")?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        log::info!("Connecting to database: {}", db_url);

        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            log::info!("Database file not found, creating...");
            Sqlite::create_database(&db_url).await.context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database migrations completed.");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        log::debug!("Reading key: {}", key);
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read key '{}'", key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        log::debug!("Writing key: {} ({} bytes)", key, value.len());
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write key '{}'", key))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        log::debug!("Removing key: {}", key);
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove key '{}'", key))?;
        Ok(())
    }
}

// --- In-Memory Store ---

/// Concurrent in-memory store with an optional size quota in bytes
/// (keys plus values).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota: Some(quota),
        }
    }

    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key() != key)
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_excluding(key) + key.len() + value.len();
            if needed > quota {
                return Err(anyhow::anyhow!(
                    "Storage quota exceeded writing '{}': {} of {} bytes",
                    key,
                    needed,
                    quota
                ));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(key);
        Ok(())
    }
}

// --- Persistence ---

// Stored messages from older clients may lack an id
#[derive(Deserialize)]
struct StoredMessage {
    id: Option<String>,
    role: crate::models::Role,
    content: String,
}

/// Best-effort typed mirror of controller state on top of a [`KeyValueStore`].
///
/// Reads treat missing or corrupt entries as absent. Writes log failures and
/// never propagate them.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                log::error!("Error reading '{}': {:?}", key, e);
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value).await {
            log::error!("Error saving '{}': {:?}", key, e);
        }
    }

    pub async fn load_conversations(&self) -> Vec<Conversation> {
        let Some(raw) = self.read(CONVERSATIONS_KEY).await else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(conversations) => conversations,
            Err(e) => {
                log::error!("Error loading conversations: {}", e);
                Vec::new()
            }
        }
    }

    /// Writes the conversation list. An empty list is skipped so that earlier
    /// data survives a transient empty state.
    pub async fn save_conversations(&self, conversations: &[Conversation]) {
        if conversations.is_empty() {
            log::debug!("Skipping save of empty conversation list");
            return;
        }
        match serde_json::to_string(conversations) {
            Ok(json) => self.write(CONVERSATIONS_KEY, &json).await,
            Err(e) => log::error!("Error serializing conversations: {}", e),
        }
    }

    pub async fn load_messages(&self, conversation_id: &str) -> Vec<Message> {
        let Some(raw) = self.read(&messages_key(conversation_id)).await else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<StoredMessage>>(&raw) {
            Ok(stored) => stored
                .into_iter()
                .enumerate()
                .map(|(index, m)| Message {
                    id: m.id.unwrap_or_else(|| format!("msg-{}", index)),
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            Err(e) => {
                log::error!("Error loading messages for {}: {}", conversation_id, e);
                Vec::new()
            }
        }
    }

    pub async fn save_messages(&self, conversation_id: &str, messages: &[Message]) {
        match serde_json::to_string(messages) {
            Ok(json) => self.write(&messages_key(conversation_id), &json).await,
            Err(e) => log::error!("Error serializing messages for {}: {}", conversation_id, e),
        }
    }

    pub async fn remove_messages(&self, conversation_id: &str) {
        let key = messages_key(conversation_id);
        if let Err(e) = self.store.remove(&key).await {
            log::error!("Error removing '{}': {:?}", key, e);
        }
    }

    pub async fn load_selected_model(&self) -> Option<Model> {
        let raw = self.read(SELECTED_MODEL_KEY).await?;
        let model = Model::from_id(&raw);
        if model.is_none() {
            log::warn!("Ignoring unknown saved model: {}", raw);
        }
        model
    }

    pub async fn save_selected_model(&self, model: Model) {
        self.write(SELECTED_MODEL_KEY, model.id()).await;
    }
}
