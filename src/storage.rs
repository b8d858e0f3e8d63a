use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{ChatMessage, Conversation, Role};

/// Storage key under which the whole conversation history is kept.
pub const HISTORY_STORAGE_KEY: &str = "ai-slides.conversations";
pub const UNTITLED_CONVERSATION: &str = "Untitled conversation";
const TITLE_MAX_CHARS: usize = 60;

// Key-value table; every value is a JSON document
const MIGRATIONS_SQL: &str = "
CREATE TABLE IF NOT EXISTS client_state (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
";

pub fn new_conversation() -> Conversation {
    let now = Utc::now();
    Conversation {
        id: Uuid::new_v4().to_string(),
        title: UNTITLED_CONVERSATION.to_string(),
        messages: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Title from the first non-empty user message, capped at 60 characters.
pub fn derive_title(messages: &[ChatMessage]) -> String {
    let Some(first) = messages
        .iter()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
    else {
        return UNTITLED_CONVERSATION.to_string();
    };

    let trimmed = first.content.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{head}…")
    }
}

fn last_activity(conversation: &Conversation) -> DateTime<Utc> {
    conversation.updated_at.max(conversation.created_at)
}

/// Most recent activity first.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by_key(|c| std::cmp::Reverse(last_activity(c)));
}

/// Conversation history, held in memory and written through to SQLite
/// after every mutation. The mutex serializes writers.
#[derive(Debug)]
pub struct StorageManager {
    pool: SqlitePool,
    conversations: Mutex<Vec<Conversation>>,
}

impl StorageManager {
    /// Creates a new StorageManager, connects to the database, runs migrations
    /// and loads the stored history.
    pub async fn new(db_path: &Path) -> Result<Self, anyhow::Error> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
        log::info!("Connecting to database: {}", db_url);

        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            log::info!("Database file not found, creating...");
            Sqlite::create_database(&db_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::run_migrations(&pool).await?;

        let conversations = Self::load(&pool).await?;
        let storage = Self {
            pool,
            conversations: Mutex::new(conversations),
        };
        // Persist the fresh conversation a corrupt or empty history was replaced with.
        {
            let conversations = storage.conversations.lock().await;
            storage.persist(&conversations).await?;
        }
        Ok(storage)
    }

    /// Applies the database schema migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
        log::info!("Running database migrations...");
        sqlx::query(MIGRATIONS_SQL)
            .execute(pool)
            .await
            .context("Failed to run database migrations")?;
        log::info!("Database migrations completed.");
        Ok(())
    }

    /// Reads the history; absent, corrupt or empty state yields one new conversation.
    async fn load(pool: &SqlitePool) -> Result<Vec<Conversation>, anyhow::Error> {
        let stored: Option<String> = sqlx::query_scalar("SELECT value FROM client_state WHERE key = ?")
            .bind(HISTORY_STORAGE_KEY)
            .fetch_optional(pool)
            .await
            .context("Failed to read conversation history")?;

        let parsed = stored.and_then(|raw| match serde_json::from_str::<Vec<Conversation>>(&raw) {
            Ok(conversations) => Some(conversations),
            Err(e) => {
                log::error!("Failed to load conversation history, starting fresh: {}", e);
                None
            }
        });

        match parsed {
            Some(mut conversations) if !conversations.is_empty() => {
                sort_conversations(&mut conversations);
                log::info!("Loaded {} conversations", conversations.len());
                Ok(conversations)
            }
            _ => Ok(vec![new_conversation()]),
        }
    }

    async fn persist(&self, conversations: &[Conversation]) -> Result<(), anyhow::Error> {
        let json = serde_json::to_string(conversations).context("Failed to serialize conversation history")?;
        sqlx::query(
            "INSERT INTO client_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(HISTORY_STORAGE_KEY)
        .bind(json)
        .execute(&self.pool)
        .await
        .context("Failed to persist conversation history")?;
        log::debug!("Persisted {} conversations", conversations.len());
        Ok(())
    }

    /// All conversations, most recent activity first.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        self.conversations.lock().await.clone()
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations
            .lock()
            .await
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
    }

    pub async fn create_conversation(&self) -> Result<Conversation, anyhow::Error> {
        let conversation = new_conversation();
        let mut conversations = self.conversations.lock().await;
        conversations.insert(0, conversation.clone());
        sort_conversations(&mut conversations);
        self.persist(&conversations).await?;
        log::info!("Created conversation {}", conversation.id);
        Ok(conversation)
    }

    /// Deletes a conversation and returns the remaining list, which is never
    /// empty: removing the last one leaves a fresh conversation behind.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<Vec<Conversation>, anyhow::Error> {
        let mut conversations = self.conversations.lock().await;
        let before = conversations.len();
        conversations.retain(|c| c.id != conversation_id);
        if conversations.len() == before {
            log::warn!("Attempted to delete non-existent conversation: {}", conversation_id);
        }
        if conversations.is_empty() {
            conversations.push(new_conversation());
        }
        self.persist(&conversations).await?;
        Ok(conversations.clone())
    }

    /// Appends `message`, or replaces the stored message with the same id.
    ///
    /// Assistant turns are upserted repeatedly while they stream (reasoning
    /// steps first, the presentation last). Returns `None` for an unknown
    /// conversation.
    pub async fn upsert_message(
        &self,
        conversation_id: &str,
        message: ChatMessage,
    ) -> Result<Option<Conversation>, anyhow::Error> {
        let mut conversations = self.conversations.lock().await;
        let Some(conversation) = conversations.iter_mut().find(|c| c.id == conversation_id) else {
            log::warn!("Message for non-existent conversation: {}", conversation_id);
            return Ok(None);
        };

        match conversation.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => conversation.messages.push(message),
        }
        if conversation.title.is_empty() || conversation.title == UNTITLED_CONVERSATION {
            conversation.title = derive_title(&conversation.messages);
        }
        conversation.updated_at = Utc::now();
        let updated = conversation.clone();

        sort_conversations(&mut conversations);
        self.persist(&conversations).await?;
        Ok(Some(updated))
    }

    /// Raw pool access for tests that tamper with the stored row.
    #[doc(hidden)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
